//! Gateway events
//!
//! Dispatch names understood by the router and the events handed to
//! subscribers.

mod event_types;
mod gateway_event;

pub use event_types::DispatchType;
pub use gateway_event::GatewayEvent;

/// Capacity of the subscriber broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
