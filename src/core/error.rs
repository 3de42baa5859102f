//! Error types for the sigcan library.

use thiserror::Error;

/// Result type alias using [`SenderError`].
pub type Result<T> = std::result::Result<T, SenderError>;

/// Errors produced by configuration loading, signal encoding and bus I/O.
#[derive(Debug, Error)]
pub enum SenderError {
    /// Malformed or inconsistent configuration (bad signal descriptor,
    /// oversized DLC, out-of-range bit span, unreadable file).
    #[error("config error: {0}")]
    Config(String),

    /// A signal could not be encoded into a frame. The affected update is
    /// skipped; the pipeline keeps running.
    #[error("encode error: {0}")]
    Encode(String),

    /// Underlying socket or filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SenderError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an encode error.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
