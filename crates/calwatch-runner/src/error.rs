//! Runner error types.

use std::io;
use std::path::{Path, PathBuf};

use calwatch_providers::ProviderError;
use thiserror::Error;

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while processing a feed.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Reading or writing a snapshot or output file failed.
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Fetching or parsing a feed failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The mail server could not be reached or the TLS handshake failed.
    #[error("SMTP connection failed: {0}")]
    Connection(String),

    /// The mail server rejected the credentials.
    #[error("SMTP authentication failed: {0}")]
    Authentication(String),

    /// The mail server returned an unexpected reply.
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// The notification could not be delivered for another reason.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Invalid runner setup.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RunnerError {
    /// Creates an IO error for `path`.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }
}
