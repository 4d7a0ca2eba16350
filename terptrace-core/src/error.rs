//! Error types for terptrace-core

use thiserror::Error;

/// Main error type for the terptrace-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Merged context is missing a required field
    ///
    /// Raised synchronously before anything is queued; required fields are
    /// never silently defaulted.
    #[error("context validation failed: `{field}` is required and must be non-empty")]
    ContextValidation { field: &'static str },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for terptrace-core
pub type Result<T> = std::result::Result<T, Error>;
