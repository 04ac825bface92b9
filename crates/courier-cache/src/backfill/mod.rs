//! Event backfill
//!
//! Parks dispatches that reference entities the store does not know yet.

mod event_cache;

pub use event_cache::{CacheKind, EventCache, Replay};
