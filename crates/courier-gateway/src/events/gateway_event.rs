use courier_core::{Channel, ConnectionStatus, Guild, Message, Snowflake, User};

/// Events published to application code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Identify confirmed and the initial guild snapshot is loaded
    Ready { user: Option<User>, guilds: usize },
    Resumed,
    GuildAvailable(Guild),
    /// The guild went dark in an outage
    GuildUnavailable(Snowflake),
    /// Left, kicked or the guild was deleted
    GuildRemoved(Snowflake),
    ChannelCreated(Channel),
    MessageReceived(Message),
    PresenceUpdated { user_id: Snowflake, status: String },
    StatusChanged {
        old: ConnectionStatus,
        new: ConnectionStatus,
    },
}

impl GatewayEvent {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Resumed => "resumed",
            Self::GuildAvailable(_) => "guild_available",
            Self::GuildUnavailable(_) => "guild_unavailable",
            Self::GuildRemoved(_) => "guild_removed",
            Self::ChannelCreated(_) => "channel_created",
            Self::MessageReceived(_) => "message_received",
            Self::PresenceUpdated { .. } => "presence_updated",
            Self::StatusChanged { .. } => "status_changed",
        }
    }
}
