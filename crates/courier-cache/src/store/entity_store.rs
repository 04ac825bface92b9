//! Entity store
//!
//! Holds every entity the gateway has told us about. Dispatch handlers write
//! into it; application code reads from it.

use super::SnowflakeCache;
use courier_core::{Channel, Guild, Snowflake, User};
use parking_lot::RwLock;
use std::collections::HashSet;

/// All cached entities for one session
#[derive(Debug, Default)]
pub struct EntityStore {
    pub users: SnowflakeCache<User>,
    pub guilds: SnowflakeCache<Guild>,
    pub channels: SnowflakeCache<Channel>,
    /// Placeholder users learned only from message authors
    pub fake_users: SnowflakeCache<User>,
    self_user: RwLock<Option<User>>,
    unavailable_guilds: RwLock<HashSet<Snowflake>>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The account this client is logged in as
    pub fn self_user(&self) -> Option<User> {
        self.self_user.read().clone()
    }

    pub fn set_self_user(&self, user: User) {
        self.users.upsert(user.clone());
        *self.self_user.write() = Some(user);
    }

    /// Look up a user, falling back to the placeholder map
    pub fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(id).or_else(|| self.fake_users.get(id))
    }

    /// Mark a guild as hidden by an outage
    pub fn mark_unavailable(&self, guild_id: Snowflake) {
        self.unavailable_guilds.write().insert(guild_id);
    }

    /// Clear the outage flag; returns true if it was set
    pub fn mark_available(&self, guild_id: Snowflake) -> bool {
        self.unavailable_guilds.write().remove(&guild_id)
    }

    pub fn is_unavailable(&self, guild_id: Snowflake) -> bool {
        self.unavailable_guilds.read().contains(&guild_id)
    }

    /// Forget everything, as after a hard session invalidation
    pub fn clear(&self) {
        let users = self.users.clear();
        let guilds = self.guilds.clear();
        let channels = self.channels.clear();
        let fake = self.fake_users.clear();
        self.unavailable_guilds.write().clear();
        *self.self_user.write() = None;

        tracing::debug!(users, guilds, channels, fake, "Entity store cleared");
    }
}
