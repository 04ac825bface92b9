//! Test fixtures and payload generators
//!
//! Wire payloads the mock API and gateway hand to the client.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

pub const TEST_TOKEN: &str = "test-token";
pub const SELF_USER_ID: &str = "1";
pub const GUILD_ID: u64 = 100;
pub const CHANNEL_ID: u64 = 200;
pub const OTHER_CHANNEL_ID: u64 = 300;

/// Counter for unique message ids
static COUNTER: AtomicU64 = AtomicU64::new(1000);

/// Get a unique id for test data
pub fn unique_id() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

pub fn self_user() -> Value {
    json!({ "id": SELF_USER_ID, "username": "courier", "discriminator": "0001", "bot": true })
}

/// READY with one guild that arrives later through GUILD_CREATE
pub fn ready(session_id: &str) -> Value {
    json!({
        "v": 6,
        "session_id": session_id,
        "user": self_user(),
        "guilds": [{ "id": GUILD_ID.to_string(), "unavailable": true }],
    })
}

pub fn guild_create() -> Value {
    json!({
        "id": GUILD_ID.to_string(),
        "name": "Test Guild",
        "owner_id": SELF_USER_ID,
        "member_count": 2,
        "channels": [
            { "id": CHANNEL_ID.to_string(), "type": 0, "name": "general", "position": 0 },
        ],
    })
}

pub fn message(id: u64, channel_id: u64, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel_id.to_string(),
        "guild_id": GUILD_ID.to_string(),
        "author": { "id": "2", "username": "friend" },
        "content": content,
    })
}
