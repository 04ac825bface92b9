use crate::error::GatewayError;
use async_trait::async_trait;

/// Supplies the websocket URL to connect to
///
/// Asked again after every failed connect.
#[async_trait]
pub trait GatewayUrlResolver: Send + Sync {
    async fn resolve(&self) -> Result<String, GatewayError>;
}

/// Always the same URL, as set in configuration
#[derive(Debug, Clone)]
pub struct StaticUrl(pub String);

#[async_trait]
impl GatewayUrlResolver for StaticUrl {
    async fn resolve(&self) -> Result<String, GatewayError> {
        Ok(self.0.clone())
    }
}
