//! Error types for the realtime layer.

use thiserror::Error;

/// Main error type for realtime operations.
///
/// Channel and callback failures never surface here: the manager absorbs
/// them. Only malformed arguments and configuration are reported.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid subscription key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid resource name: {0:?}")]
    InvalidResource(String),

    #[error("Invalid filter expression: {0}")]
    InvalidFilter(String),

    #[error("Invalid change payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RealtimeError {
    fn from(e: serde_json::Error) -> Self {
        RealtimeError::Serialization(e.to_string())
    }
}

/// Error returned by user-supplied message callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for realtime operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;
