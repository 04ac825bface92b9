//! Connection status tracking
//!
//! A single status value drives both the gateway state machine and any
//! caller blocked waiting for the client to become ready.

mod connection_status;
mod status_cell;

pub use connection_status::ConnectionStatus;
pub use status_cell::{StatusCell, StatusError};
