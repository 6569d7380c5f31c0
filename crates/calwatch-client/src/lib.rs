//! The `calwatch` command line.
//!
//! Loads `config.toml`, resolves it into immutable settings and runs the
//! feed pipeline once (`run`), on an interval (`watch`) or against local
//! files (`diff`).

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use config::Settings;
pub use error::{ClientError, ClientResult};
