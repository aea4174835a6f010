//! Error types for the memory console

use std::io;

use thiserror::Error;

/// Result type alias for the memory console
pub type Result<T> = std::result::Result<T, Error>;

/// Memory console errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-side input rejected before any request is issued
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport error (network unreachable, timeout, unreadable body)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response payload did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error was raised before the request left the process
    #[must_use]
    pub fn is_caller_side(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Config(_))
    }
}
