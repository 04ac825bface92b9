//! Gateway error types

use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway connection is shut down")]
    Shutdown,

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to resolve gateway URL: {0}")]
    Resolve(String),
}

impl GatewayError {
    /// Error code for logs
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Shutdown => "SHUTDOWN",
            Self::Encode(_) => "ENCODE_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Resolve(_) => "RESOLVE_ERROR",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
