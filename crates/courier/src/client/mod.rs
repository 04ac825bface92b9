//! The client facade
//!
//! Owns one REST dispatcher and one gateway connection sharing a status
//! cell. The gateway writes every connection status; the facade only adds
//! the login statuses in front and the REST teardown behind.

mod builder;
mod resolver;

pub use builder::ClientBuilder;
pub use resolver::RestGatewayResolver;

use crate::error::{ClientError, ClientResult};
use courier_cache::EntityStore;
use courier_common::ClientConfig;
use courier_core::{ConnectionStatus, StatusCell, StatusError};
use courier_gateway::{GatewayClient, GatewayEvent};
use courier_rest::Requester;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct Client {
    config: ClientConfig,
    status: Arc<StatusCell>,
    rest: Arc<Requester>,
    gateway: Arc<GatewayClient>,
    shutdown: AtomicBool,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Log in with default collaborators
    ///
    /// # Errors
    /// See [`ClientBuilder::login`].
    pub async fn login(config: ClientConfig) -> ClientResult<Arc<Self>> {
        ClientBuilder::new(config).login().await
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    fn assemble(
        config: ClientConfig,
        status: Arc<StatusCell>,
        rest: Arc<Requester>,
        gateway: Arc<GatewayClient>,
    ) -> Self {
        Self {
            config,
            status,
            rest,
            gateway,
            shutdown: AtomicBool::new(false),
            monitor: Mutex::new(None),
        }
    }

    /// Shut REST down as well if the gateway gives up on its own
    fn spawn_monitor(&self) {
        let mut rx = self.status.subscribe();
        let rest = Arc::clone(&self.rest);
        let gateway = Arc::clone(&self.gateway);

        let handle = tokio::spawn(async move {
            if rx
                .wait_for(|status| *status == ConnectionStatus::Shutdown)
                .await
                .is_ok()
                && !rest.is_shutdown()
            {
                tracing::warn!(
                    reason = gateway.terminal_reason().as_deref().unwrap_or("unknown"),
                    "Gateway shut down, stopping REST requester"
                );
                rest.shutdown();
            }
        });
        *self.monitor.lock() = Some(handle);
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    /// Wait until the login cycle reaches `target`
    ///
    /// # Errors
    /// Fails if the client shuts down, if a status in `fail_on` is observed,
    /// or if `target` is not a login-cycle status.
    pub async fn await_status(
        &self,
        target: ConnectionStatus,
        fail_on: &[ConnectionStatus],
    ) -> ClientResult<ConnectionStatus> {
        self.status
            .await_status(target, fail_on)
            .await
            .map_err(|e| self.status_error(e))
    }

    /// Wait until the gateway is connected and the initial load is done
    ///
    /// # Errors
    /// Fails with [`ClientError::Shutdown`] carrying the terminal reason.
    pub async fn await_ready(&self) -> ClientResult<()> {
        self.status
            .await_ready()
            .await
            .map_err(|e| self.status_error(e))
    }

    fn status_error(&self, error: StatusError) -> ClientError {
        match error {
            StatusError::Shutdown => ClientError::Shutdown {
                reason: self.gateway.terminal_reason(),
            },
            StatusError::FailFast(status) => ClientError::FailFast(status),
            StatusError::NotInitStatus(status) => ClientError::NotInitStatus(status),
        }
    }

    /// Gateway events: dispatches and status transitions
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.gateway.subscribe()
    }

    pub fn rest(&self) -> &Arc<Requester> {
        &self.rest
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        self.gateway.store()
    }

    pub fn gateway(&self) -> &Arc<GatewayClient> {
        &self.gateway
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst) || self.status() == ConnectionStatus::Shutdown
    }

    /// Drop the gateway session and identify again; REST is left alone
    ///
    /// # Errors
    /// Fails after shutdown.
    pub async fn reset_session(&self) -> ClientResult<()> {
        if self.is_shutdown() {
            return Err(ClientError::Shutdown {
                reason: self.gateway.terminal_reason(),
            });
        }
        self.gateway.reset_session().await;
        Ok(())
    }

    /// Close everything; calling it again is a no-op
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutting down client");

        if self.status() != ConnectionStatus::Shutdown {
            self.status.set(ConnectionStatus::ShuttingDown);
        }
        self.gateway.shutdown().await;
        // New requests are refused; in-flight ones finish on their own
        self.rest.shutdown();

        if let Some(monitor) = self.monitor.lock().take() {
            monitor.abort();
        }
        self.status.set(ConnectionStatus::Shutdown);
        tracing::info!("Client shut down");
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("shard", &self.config.shard)
            .field("status", &self.status())
            .field("gateway", &self.gateway)
            .finish()
    }
}
