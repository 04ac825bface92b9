//! Gateway connection
//!
//! The per-shard state machine and the connect nodes it schedules.

mod client;
mod nodes;
mod resolver;

pub use client::{GatewayClient, GatewayClientBuilder, DEFAULT_GATEWAY_URL, INVALIDATE_REASON};
pub use resolver::{GatewayUrlResolver, StaticUrl};
