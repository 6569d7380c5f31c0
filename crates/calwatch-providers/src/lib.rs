//! Calendar feed fetching and parsing.
//!
//! - [`FeedSource`] - the trait the pipeline fetches feeds through
//! - [`HttpFeedSource`] - the reqwest-backed implementation
//! - [`parse_snapshot`] - iCalendar text to [`Snapshot`](calwatch_core::Snapshot)
//! - [`ProviderError`] - error types for fetching and parsing
//!
//! ```text
//!   feed URL ──▶ FeedSource::fetch ──▶ bytes ──▶ parse_snapshot_bytes ──▶ Snapshot
//! ```

pub mod error;
pub mod feed;
pub mod ics;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use feed::{BoxFuture, FeedConfig, FeedSource, HttpFeedSource};
pub use ics::{parse_snapshot, parse_snapshot_bytes};
