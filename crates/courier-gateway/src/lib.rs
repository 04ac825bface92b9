//! # courier-gateway
//!
//! Persistent gateway connection for one shard: the connection state
//! machine, its heartbeat, the outbound throttle, dispatch handling and the
//! scheduler that spaces connect attempts across shards.

pub mod compression;
pub mod connection;
pub mod error;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod scheduler;
pub mod throttle;
pub mod transport;

pub use connection::{GatewayClient, GatewayClientBuilder, GatewayUrlResolver, StaticUrl};
pub use error::{GatewayError, GatewayResult};
pub use events::GatewayEvent;
pub use protocol::{CloseCode, GatewayMessage, OpCode};
pub use scheduler::ConnectScheduler;
pub use transport::{TransportConnector, TungsteniteConnector};
