//! Askpass error types.

use thiserror::Error;

/// Askpass errors. All of them end the invocation with a failure exit code.
#[derive(Debug, Error)]
pub enum AskpassError {
    /// Not started by a broker, or the contract variables are unusable.
    #[error("{0}")]
    Core(#[from] gitssh_core::Error),

    #[error("Cannot reach the host process at {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("{method} failed: {status}")]
    Rpc {
        method: &'static str,
        status: tonic::Status,
    },

    #[error("Invalid prompt pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Prompt pattern `{pattern}` has no `{group}` group")]
    MissingGroup {
        pattern: &'static str,
        group: &'static str,
    },

    #[error("Invalid host key: {0}")]
    InvalidKey(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AskpassError {
    /// Whether the environment contract is missing or broken.
    pub const fn is_not_configured(&self) -> bool {
        matches!(
            self,
            Self::Core(
                gitssh_core::Error::MissingEnv(_) | gitssh_core::Error::InvalidEnv { .. }
            )
        )
    }
}
