//! Gateway URL discovery through the REST API

use async_trait::async_trait;
use courier_gateway::{GatewayError, GatewayUrlResolver};
use courier_rest::Requester;
use std::sync::Arc;

/// Asks `GET /gateway` for the websocket URL on every fresh resolve
pub struct RestGatewayResolver {
    rest: Arc<Requester>,
}

impl RestGatewayResolver {
    pub fn new(rest: Arc<Requester>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl GatewayUrlResolver for RestGatewayResolver {
    async fn resolve(&self) -> Result<String, GatewayError> {
        self.rest
            .fetch_gateway_url()
            .await
            .map_err(|e| GatewayError::Resolve(e.to_string()))
    }
}
