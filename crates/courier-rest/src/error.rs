//! REST error types

use crate::http::TransportError;
use crate::route::RouteError;
use std::time::Duration;

/// Errors returned to the caller that issued a request
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Quota exhausted and the caller opted out of queueing
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration, global: bool },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Still 5xx after every attempt
    #[error("Server error {status} after {attempts} attempts")]
    Server { status: u16, attempts: u32 },

    /// Any other non-success status, not retried
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidRoute(#[from] RouteError),

    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("Requester is shut down")]
    Shutdown,
}

impl RestError {
    /// Error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Http { .. } => "HTTP_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::InvalidRoute(_) => "INVALID_ROUTE",
            Self::InvalidHeader(_) => "INVALID_HEADER",
            Self::Shutdown => "SHUTDOWN",
        }
    }

    /// HTTP status behind the error, if one was received
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether resubmitting the same request later may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Server { .. } => true,
            Self::Transport(e) => e.is_transient(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401, .. })
    }
}

/// Result type alias for REST operations
pub type RestResult<T> = Result<T, RestError>;
