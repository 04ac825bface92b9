//! Client error types
//!
//! Wraps the errors of every layer the facade drives.

use courier_common::ConfigError;
use courier_core::ConnectionStatus;
use courier_gateway::GatewayError;
use courier_rest::RestError;

/// Errors surfaced by [`crate::Client`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The API rejected the credential
    #[error("Invalid token")]
    InvalidToken,

    /// The credential could not be checked at all
    #[error("Login failed: {0}")]
    Login(String),

    /// The client reached `Shutdown` while the caller was waiting
    #[error("Client shut down: {}", reason.as_deref().unwrap_or("no reason recorded"))]
    Shutdown { reason: Option<String> },

    /// A caller-named fail-fast status was reached
    #[error("Reached fail-fast status {0}")]
    FailFast(ConnectionStatus),

    /// Only statuses of the initial login cycle can be awaited
    #[error("{0} is not part of the initial login cycle")]
    NotInitStatus(ConnectionStatus),
}

impl ClientError {
    /// Error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Rest(e) => e.error_code(),
            Self::Gateway(e) => e.error_code(),
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Login(_) => "LOGIN_FAILED",
            Self::Shutdown { .. } => "SHUTDOWN",
            Self::FailFast(_) => "FAIL_FAST",
            Self::NotInitStatus(_) => "NOT_INIT_STATUS",
        }
    }

    /// Whether the client can no longer be used
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken | Self::Shutdown { .. } | Self::Config(_)
        )
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
