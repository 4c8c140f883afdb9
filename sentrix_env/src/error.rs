//! Error types for the SENTRIX environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The feed endpoint could not be reached (connection refused, DNS, etc.)
    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    /// The feed answered but the record could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),

    /// The feed did not answer within the poll timeout
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a feed-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::FeedUnavailable(msg.into())
    }

    /// Creates a decode error.
    pub fn decode(msg: impl std::fmt::Display) -> Self {
        Self::Decode(msg.to_string())
    }
}
