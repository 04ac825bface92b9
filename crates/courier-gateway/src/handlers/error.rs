//! Handler error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload did not have the expected shape
    #[error("Invalid {event} payload: {source}")]
    InvalidPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing field {0}")]
    MissingField(&'static str),
}

impl HandlerError {
    pub(crate) fn invalid(event: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::InvalidPayload { event, source }
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;
