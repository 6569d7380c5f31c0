//! Error types for configuration values the core validates.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while resolving core settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The time zone is not a known IANA identifier.
    #[error("unknown time zone: {0}")]
    InvalidTimezone(String),

    /// The date pattern contains an invalid strftime specifier.
    #[error("invalid date format pattern: {0}")]
    InvalidDatePattern(String),
}
