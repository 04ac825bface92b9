//! # courier-core
//!
//! Core types shared by the gateway and REST halves of the client: snowflake
//! identifiers, the connection status machine, and the entity shapes the
//! caches hold.

pub mod entities;
pub mod status;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Channel, ChannelType, Guild, Message, User};
pub use status::{ConnectionStatus, StatusCell, StatusError};
pub use value_objects::{Snowflake, SnowflakeParseError};
