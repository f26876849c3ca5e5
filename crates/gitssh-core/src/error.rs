//! Error types for `gitssh` core library.

use thiserror::Error;

/// Result type alias using `gitssh` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `gitssh` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A wire answer did not start with either presence marker
    #[error("Malformed encoded answer: {0:?}")]
    MalformedAnswer(String),

    /// A required environment variable is not set
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// An environment variable holds an unusable value
    #[error("Environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Message resource error
    #[error("Message resource error: {0}")]
    Messages(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
