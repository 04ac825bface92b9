//! Outbound frame throttle
//!
//! Every frame written to the gateway goes through a rolling-window budget.
//! A slice of the budget is held back for heartbeat, identify and resume so
//! that a flood of regular frames can never starve them.

mod outbound_queue;
mod send_window;

pub use outbound_queue::{run_sender, OutboundQueue};
pub use send_window::SendWindow;
