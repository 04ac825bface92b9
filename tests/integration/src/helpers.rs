//! Test helpers for integration tests
//!
//! Spawns the mock API and gateway on an ephemeral port and builds client
//! configuration pointing at it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use courier::{ClientConfig, GatewayEvent};
use courier_common::RestConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::fixtures::TEST_TOKEN;
use crate::mock_api::{self, MockState};
use crate::mock_gateway;

/// How long helpers wait before failing a test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the mock application
pub fn create_mock_app(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/users/@me", get(mock_api::get_self))
        .route("/api/gateway", get(mock_api::get_gateway))
        .route(
            "/api/channels/:channel_id/messages",
            post(mock_api::create_message),
        )
        .route("/gateway", get(mock_gateway::upgrade))
        .with_state(state)
}

/// Mock server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start the mock API and gateway
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(MockState::new(format!("ws://{addr}/gateway")));
        let app = create_mock_app(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Client configuration with short identify spacing and backoff
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(TEST_TOKEN)
            .with_api_url(self.api_url())
            .with_identify_interval(Duration::from_millis(100))
            .with_reconnect_delay(Duration::from_millis(50), Duration::from_millis(500))
    }

    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.api_url(),
            ..RestConfig::default()
        }
    }
}

/// Poll `condition` until it holds or the test timeout passes
pub async fn wait_until<F>(what: &str, condition: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("Timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Next gateway event matching `predicate`
pub async fn next_event<F>(
    events: &mut broadcast::Receiver<GatewayEvent>,
    predicate: F,
) -> Result<GatewayEvent>
where
    F: Fn(&GatewayEvent) -> bool,
{
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Ok(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    anyhow::bail!("Event channel closed")
                }
            }
        }
    };
    tokio::time::timeout(TEST_TIMEOUT, wait)
        .await
        .map_err(|_| anyhow::anyhow!("Timed out waiting for a gateway event"))?
}
