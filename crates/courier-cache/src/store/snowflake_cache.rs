//! Generic snowflake-keyed cache
//!
//! One collection type serves every entity kind. Readers take the read lock
//! per call; iteration goes through a [`CacheSnapshot`] that holds the read
//! lock for as long as it lives.

use courier_core::{Channel, Guild, Snowflake, User};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::hash_map::Values;
use std::collections::HashMap;

/// Entities that carry their own cache key
pub trait CacheEntity: Clone + Send + Sync {
    fn id(&self) -> Snowflake;
}

impl CacheEntity for User {
    fn id(&self) -> Snowflake {
        self.id
    }
}

impl CacheEntity for Guild {
    fn id(&self) -> Snowflake {
        self.id
    }
}

impl CacheEntity for Channel {
    fn id(&self) -> Snowflake {
        self.id
    }
}

/// Thread-safe map from snowflake to entity
#[derive(Debug)]
pub struct SnowflakeCache<T> {
    entries: RwLock<HashMap<Snowflake, T>>,
}

impl<T> Default for SnowflakeCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> SnowflakeCache<T> {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `id`, returning the old value
    pub fn insert(&self, id: Snowflake, value: T) -> Option<T> {
        self.entries.write().insert(id, value)
    }

    /// Clone out the entry for `id`
    pub fn get(&self, id: Snowflake) -> Option<T> {
        self.entries.read().get(&id).cloned()
    }

    /// Check whether `id` is cached
    pub fn contains(&self, id: Snowflake) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Remove and return the entry for `id`
    pub fn remove(&self, id: Snowflake) -> Option<T> {
        self.entries.write().remove(&id)
    }

    /// Mutate the entry for `id` in place; returns false if it is absent
    pub fn update<F>(&self, id: Snowflake, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.entries.write().get_mut(&id) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry, returning how many were held
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Lock the cache for reading and iterate it in place
    ///
    /// Writers block until the snapshot is dropped, so keep it short-lived.
    pub fn snapshot(&self) -> CacheSnapshot<'_, T> {
        CacheSnapshot {
            guard: self.entries.read(),
        }
    }
}

impl<T: CacheEntity> SnowflakeCache<T> {
    /// Insert or replace an entity under its own id
    pub fn upsert(&self, entity: T) -> Option<T> {
        self.insert(entity.id(), entity)
    }
}

/// A read-locked view over a [`SnowflakeCache`]
pub struct CacheSnapshot<'a, T> {
    guard: RwLockReadGuard<'a, HashMap<Snowflake, T>>,
}

impl<T> CacheSnapshot<'_, T> {
    pub fn get(&self, id: Snowflake) -> Option<&T> {
        self.guard.get(&id)
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    /// Iterate the cached entities in unspecified order
    pub fn iter(&self) -> Values<'_, Snowflake, T> {
        self.guard.values()
    }

    /// Ids of every cached entity
    pub fn ids(&self) -> Vec<Snowflake> {
        self.guard.keys().copied().collect()
    }
}

impl<'s, T> IntoIterator for &'s CacheSnapshot<'_, T> {
    type Item = &'s T;
    type IntoIter = Values<'s, Snowflake, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
