//! Connect Scheduler
//!
//! One FIFO of pending connect and resume attempts shared by every shard
//! that logs in with the same credential. Attempts are run one at a time and
//! spaced by the identify throttle.

mod connect_scheduler;
mod node;

pub use connect_scheduler::{ConnectScheduler, DEFAULT_CONNECT_INTERVAL};
pub use node::{ConnectError, ConnectNode, NodeKey, NodeKind};
