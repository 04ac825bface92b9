//! # courier
//!
//! Client for a sharded real-time gateway and its rate-limited REST API.
//!
//! ```no_run
//! # async fn run() -> Result<(), courier::ClientError> {
//! courier::init_tracing();
//! let config = courier::ClientConfig::from_env()?;
//! let client = courier::Client::login(config).await?;
//! client.await_ready().await?;
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{Client, ClientBuilder, RestGatewayResolver};
pub use error::{ClientError, ClientResult};

pub use courier_cache::{EntityStore, EventCache};
pub use courier_common::{init_tracing, try_init_tracing, ClientConfig, ConfigError, TracingConfig};
pub use courier_core::{Channel, ConnectionStatus, Guild, Message, Snowflake, User};
pub use courier_gateway::{ConnectScheduler, GatewayClient, GatewayEvent};
pub use courier_rest::{Requester, RestError};
