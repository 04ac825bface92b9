//! Dispatch event names
//!
//! The `t` field of the dispatches this client reacts to.

use std::fmt;

/// Dispatch events with a registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchType {
    /// Sent after a successful identify
    Ready,
    /// Sent after a successful resume
    Resumed,
    GuildCreate,
    GuildDelete,
    ChannelCreate,
    MessageCreate,
    PresenceUpdate,
    /// Bulk presence snapshot; expanded into one `PRESENCE_UPDATE` per entry
    PresencesReplace,
}

impl DispatchType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::PresencesReplace => "PRESENCES_REPLACE",
        }
    }

    /// Parse the `t` field; `None` for events nobody handles
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "READY" => Some(Self::Ready),
            "RESUMED" => Some(Self::Resumed),
            "GUILD_CREATE" => Some(Self::GuildCreate),
            "GUILD_DELETE" => Some(Self::GuildDelete),
            "CHANNEL_CREATE" => Some(Self::ChannelCreate),
            "MESSAGE_CREATE" => Some(Self::MessageCreate),
            "PRESENCE_UPDATE" => Some(Self::PresenceUpdate),
            "PRESENCES_REPLACE" => Some(Self::PresencesReplace),
            _ => None,
        }
    }

    /// Whether the event still applies to a guild hidden by an outage
    #[must_use]
    pub const fn allowed_while_unavailable(self) -> bool {
        matches!(self, Self::GuildCreate | Self::GuildDelete)
    }
}

impl fmt::Display for DispatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_mapping() {
        for kind in [
            DispatchType::Ready,
            DispatchType::GuildCreate,
            DispatchType::MessageCreate,
            DispatchType::PresencesReplace,
        ] {
            assert_eq!(DispatchType::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(DispatchType::from_name("TYPING_START"), None);
    }

    #[test]
    fn test_unavailable_filter() {
        assert!(DispatchType::GuildCreate.allowed_while_unavailable());
        assert!(!DispatchType::MessageCreate.allowed_while_unavailable());
    }
}
