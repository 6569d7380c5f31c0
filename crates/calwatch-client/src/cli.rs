//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// calwatch - mail a summary whenever a calendar feed changes
#[derive(Debug, Parser)]
#[command(name = "calwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Feed and recipient lists that replace the configured ones.
#[derive(Debug, Clone, Default, Args)]
pub struct FeedArgs {
    /// Feed URL to check (repeatable or comma-separated)
    #[arg(long = "feed", env = "CALWATCH_FEEDS", value_delimiter = ',')]
    pub feeds: Vec<String>,

    /// Mail recipient (repeatable or comma-separated)
    #[arg(long = "recipient", env = "CALWATCH_RECIPIENTS", value_delimiter = ',')]
    pub recipients: Vec<String>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check every feed once and send change notifications (default)
    Run {
        /// Print notifications instead of sending them and store nothing
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        feeds: FeedArgs,
    },

    /// Check every feed repeatedly until interrupted
    Watch {
        /// Seconds between passes
        #[arg(
            long,
            short,
            env = "CALWATCH_INTERVAL",
            default_value = "900",
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval: u64,

        #[command(flatten)]
        feeds: FeedArgs,
    },

    /// Compare two local calendar files and print the changes
    Diff {
        /// The earlier calendar file
        old: PathBuf,

        /// The later calendar file
        new: PathBuf,

        /// Print the HTML body instead of plain text
        #[arg(long)]
        html: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
