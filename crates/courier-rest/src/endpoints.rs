//! Endpoints the client itself needs: token check, gateway discovery and
//! sending a message

use crate::error::{RestError, RestResult};
use crate::requester::{Requester, RestRequest};
use crate::route::routes;
use courier_core::{Message, Snowflake, User};
use serde::Deserialize;
use serde_json::json;

/// Outcome of checking the bearer token against `users/@me`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerification {
    Valid(User),
    /// The server rejected the credential outright
    InvalidCredential,
    /// A 401 that may be a transient auth hiccup; check once more
    AmbiguousNeedsRetry,
    NetworkError(String),
}

impl TokenVerification {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    url: String,
}

impl Requester {
    /// Check the credential by fetching the current user
    pub async fn verify_token(&self) -> TokenVerification {
        let request = match routes::GET_SELF.compile(&[]) {
            Ok(route) => RestRequest::new(route),
            Err(e) => return TokenVerification::NetworkError(e.to_string()),
        };

        match self.execute(request).await {
            Ok(response) => match response.json::<User>() {
                Ok(user) => TokenVerification::Valid(user),
                Err(e) => TokenVerification::NetworkError(format!("malformed self user: {e}")),
            },
            Err(RestError::Http { status: 401, .. }) => {
                tracing::debug!("Token check answered 401");
                TokenVerification::AmbiguousNeedsRetry
            }
            Err(RestError::Http { status: 403, .. }) => TokenVerification::InvalidCredential,
            Err(e) => TokenVerification::NetworkError(e.to_string()),
        }
    }

    /// The currently logged-in user
    pub async fn get_self(&self) -> RestResult<User> {
        let route = routes::GET_SELF.compile(&[])?;
        self.execute_json(RestRequest::new(route)).await
    }

    /// Resolve the gateway websocket URL
    pub async fn fetch_gateway_url(&self) -> RestResult<String> {
        let route = routes::GATEWAY.compile(&[])?;
        let response: GatewayResponse = self.execute_json(RestRequest::new(route)).await?;
        tracing::debug!(url = %response.url, "Resolved gateway URL");
        Ok(response.url)
    }

    /// Post a plain text message to a channel
    pub async fn send_message(&self, channel_id: Snowflake, content: &str) -> RestResult<Message> {
        let channel = channel_id.to_string();
        let route = routes::SEND_MESSAGE.compile(&[&channel])?;
        let request = RestRequest::new(route).with_body(json!({ "content": content }));
        self.execute_json(request).await
    }
}
