//! Client construction and login

use super::resolver::RestGatewayResolver;
use super::Client;
use crate::error::{ClientError, ClientResult};
use courier_cache::EntityStore;
use courier_common::ClientConfig;
use courier_core::{ConnectionStatus, StatusCell, User};
use courier_gateway::{ConnectScheduler, GatewayClient, GatewayUrlResolver, TransportConnector};
use courier_rest::{HttpClient, Requester, TokenVerification};
use std::sync::Arc;

/// Builder for [`Client`] with replaceable collaborators
pub struct ClientBuilder {
    config: ClientConfig,
    http: Option<Arc<dyn HttpClient>>,
    connector: Option<Arc<dyn TransportConnector>>,
    scheduler: Option<ConnectScheduler>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: None,
            connector: None,
            scheduler: None,
        }
    }

    pub fn http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn TransportConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Share connect spacing with other clients of the same credential
    pub fn scheduler(mut self, scheduler: ConnectScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Verify the token, then queue the first gateway connect
    ///
    /// Returns once the connect is queued; use [`Client::await_ready`] to
    /// wait for the session.
    ///
    /// # Errors
    /// Fails on invalid configuration, a rejected token, or when the
    /// credential cannot be checked.
    pub async fn login(self) -> ClientResult<Arc<Client>> {
        let config = self.config;
        config.validate()?;

        let status = Arc::new(StatusCell::default());
        status.set(ConnectionStatus::Initialized);

        let authorization = config.authorization();
        let rest = Arc::new(match self.http {
            Some(http) => Requester::new(&config.rest, &authorization, http)?,
            None => Requester::with_reqwest(&config.rest, &authorization)?,
        });

        status.set(ConnectionStatus::LoggingIn);
        let user = match verify_token(&rest).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(error = %e, "Login failed");
                rest.shutdown();
                status.set(ConnectionStatus::Shutdown);
                return Err(e);
            }
        };
        tracing::info!(user = %user.tag(), id = %user.id, "Logged in");

        let store = Arc::new(EntityStore::default());
        store.set_self_user(user);

        let mut gateway = GatewayClient::builder(&config)
            .status(Arc::clone(&status))
            .store(store);
        if config.gateway.url.is_none() {
            gateway = gateway.resolver(
                Arc::new(RestGatewayResolver::new(Arc::clone(&rest))) as Arc<dyn GatewayUrlResolver>
            );
        }
        if let Some(connector) = self.connector {
            gateway = gateway.connector(connector);
        }
        if let Some(scheduler) = self.scheduler {
            gateway = gateway.scheduler(scheduler);
        }
        let gateway = gateway.build();

        let client = Arc::new(Client::assemble(config, status, rest, Arc::clone(&gateway)));
        client.spawn_monitor();
        gateway.start();
        Ok(client)
    }
}

/// Check the credential, asking once more on an ambiguous 401
async fn verify_token(rest: &Requester) -> ClientResult<User> {
    let mut retried = false;
    loop {
        match rest.verify_token().await {
            TokenVerification::Valid(user) => return Ok(user),
            TokenVerification::InvalidCredential => return Err(ClientError::InvalidToken),
            TokenVerification::AmbiguousNeedsRetry if !retried => {
                tracing::debug!("Token check was ambiguous, retrying");
                retried = true;
            }
            TokenVerification::AmbiguousNeedsRetry => return Err(ClientError::InvalidToken),
            TokenVerification::NetworkError(e) => return Err(ClientError::Login(e)),
        }
    }
}
