//! Broker error types.

use thiserror::Error;
use tonic::Status;

use crate::artifact::ArtifactError;
use crate::server::ServerError;

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Lookup or unregistration of a token that is not registered.
    #[error("No handler registered for token {token}")]
    UnknownHandler { token: i32 },

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Endpoint error: {0}")]
    Endpoint(#[from] ServerError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<BrokerError> for Status {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::UnknownHandler { .. } => Self::not_found(err.to_string()),
            BrokerError::Artifact(_) | BrokerError::Endpoint(_) | BrokerError::Join(_) => {
                Self::internal(err.to_string())
            }
        }
    }
}
