//! Guild entity

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Guild (server) entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub member_count: Option<u64>,
    /// Set while an outage hides the guild's contents
    #[serde(default)]
    pub unavailable: bool,
}

impl Guild {
    /// Create an unavailable placeholder, as announced in READY
    pub fn unavailable(id: Snowflake) -> Self {
        Self {
            id,
            name: String::new(),
            owner_id: None,
            member_count: None,
            unavailable: true,
        }
    }

    /// Check if a user is the guild owner
    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == Some(user_id)
    }
}
