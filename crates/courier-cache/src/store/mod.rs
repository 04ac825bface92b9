//! Entity caches

mod entity_store;
mod snowflake_cache;

pub use entity_store::EntityStore;
pub use snowflake_cache::{CacheEntity, CacheSnapshot, SnowflakeCache};
