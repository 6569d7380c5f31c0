//! Client error types.

use std::fmt;

use calwatch_core::CoreError;
use calwatch_providers::ProviderError;
use calwatch_runner::RunnerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Invalid or unreadable configuration.
    Config(String),
    /// IO error.
    Io(std::io::Error),
    /// Fetching or parsing a feed failed.
    Provider(ProviderError),
    /// A run could not be set up or some feeds failed.
    Run(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Provider(err) => write!(f, "feed error: {}", err),
            Self::Run(msg) => write!(f, "run failed: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

impl From<RunnerError> for ClientError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Config(msg) => Self::Config(msg),
            RunnerError::Provider(err) => Self::Provider(err),
            other => Self::Run(other.to_string()),
        }
    }
}
