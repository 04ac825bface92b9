//! Connect nodes queued on the scheduler by a [`GatewayClient`]

use super::GatewayClient;
use crate::scheduler::{ConnectError, ConnectNode, NodeKey};
use async_trait::async_trait;
use courier_core::ConnectionStatus;
use std::sync::{Arc, Weak};

/// First identify of a connection
pub(crate) struct StartNode {
    client: Weak<GatewayClient>,
    key: NodeKey,
}

impl StartNode {
    pub(crate) fn new(client: &Arc<GatewayClient>) -> Self {
        Self {
            client: Arc::downgrade(client),
            key: client.start_key(),
        }
    }
}

#[async_trait]
impl ConnectNode for StartNode {
    fn key(&self) -> NodeKey {
        self.key
    }

    async fn run(&self, is_last: bool) -> Result<(), ConnectError> {
        let Some(client) = self.client.upgrade() else {
            return Ok(());
        };
        if client.is_shutdown() {
            return Ok(());
        }

        connect(&client, is_last).await
    }
}

/// Resume or re-identify after the transport dropped
pub(crate) struct ReconnectNode {
    client: Weak<GatewayClient>,
    key: NodeKey,
}

impl ReconnectNode {
    pub(crate) fn new(client: &Arc<GatewayClient>) -> Self {
        Self {
            client: Arc::downgrade(client),
            key: client.reconnect_key(),
        }
    }
}

#[async_trait]
impl ConnectNode for ReconnectNode {
    fn key(&self) -> NodeKey {
        self.key
    }

    async fn run(&self, is_last: bool) -> Result<(), ConnectError> {
        let Some(client) = self.client.upgrade() else {
            return Ok(());
        };
        if client.is_shutdown() {
            return Ok(());
        }

        client.set_status(ConnectionStatus::WaitingToReconnect);
        let delay = client.next_reconnect_delay();
        tracing::info!(shard = ?client.shard(), ?delay, "Waiting before reconnecting");
        if !client.sleep_unless_shutdown(delay).await {
            return Ok(());
        }

        client.set_status(ConnectionStatus::Reconnecting);
        connect(&client, is_last).await
    }
}

async fn connect(client: &Arc<GatewayClient>, is_last: bool) -> Result<(), ConnectError> {
    if let Err(e) = client.connect().await {
        if !client.is_shutdown() {
            client.set_status(ConnectionStatus::ReconnectQueued);
        }
        return Err(e);
    }

    // Hold the queue until this session is loading so identifies stay spaced
    if !is_last {
        client.await_loading().await;
    }
    Ok(())
}
