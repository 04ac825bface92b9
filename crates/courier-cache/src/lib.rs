//! # courier-cache
//!
//! In-memory state shared between the gateway reader and application code.
//!
//! ## Features
//!
//! - **Keyed caches**: one generic snowflake-keyed collection per entity kind,
//!   with read/write locking and locked snapshots for iteration
//! - **Entity store**: users, guilds, channels and placeholder users
//! - **Backfill**: dispatches that reference unknown entities are parked and
//!   replayed once the dependency shows up
//!
//! ## Example
//!
//! ```ignore
//! use courier_cache::{CacheKind, EntityStore, EventCache};
//!
//! let store = EntityStore::new();
//! let backfill = EventCache::new(100);
//!
//! if !store.channels.contains(channel_id) {
//!     backfill.cache(CacheKind::Channel, channel_id, seq, payload, replay);
//! }
//! ```

pub mod backfill;
pub mod store;

pub use backfill::{CacheKind, EventCache, Replay};
pub use store::{CacheEntity, CacheSnapshot, EntityStore, SnowflakeCache};
