//! Connection status values
//!
//! Declaration order is significant: the statuses of the initial login cycle
//! come first so ordered waits can compare them.

use serde::{Deserialize, Serialize};

/// Lifecycle status of the client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Client object constructed, nothing started yet
    Initializing,
    /// Configuration validated, login not yet started
    Initialized,
    /// Verifying the credential against the REST API
    LoggingIn,
    /// Opening the gateway transport
    Connecting,
    /// Transport open, waiting for HELLO to identify or resume
    Identifying,
    /// Identify or resume sent, waiting for the server to confirm
    AwaitingConfirmation,
    /// Session confirmed, initial snapshot still streaming in
    Loading,
    /// Fully connected and loaded
    Connected,
    /// Transport closed, recovery not yet decided
    Disconnected,
    /// Waiting for the connect scheduler to admit a reconnect
    ReconnectQueued,
    /// Sleeping out the reconnect backoff
    WaitingToReconnect,
    /// Reconnect attempt in progress
    Reconnecting,
    /// Shutdown requested, tearing down
    ShuttingDown,
    /// Terminal state
    Shutdown,
}

impl ConnectionStatus {
    /// Whether this status is part of the initial login cycle
    #[must_use]
    pub const fn is_init(self) -> bool {
        matches!(
            self,
            Self::Initializing
                | Self::Initialized
                | Self::LoggingIn
                | Self::Connecting
                | Self::Identifying
                | Self::AwaitingConfirmation
                | Self::Loading
                | Self::Connected
        )
    }

    /// Whether this status belongs to reconnect recovery
    #[must_use]
    pub const fn is_reconnecting(self) -> bool {
        matches!(
            self,
            Self::Disconnected
                | Self::ReconnectQueued
                | Self::WaitingToReconnect
                | Self::Reconnecting
        )
    }

    /// Whether the client is on its way down
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Shutdown)
    }

    /// Get the name of this status
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Initialized => "INITIALIZED",
            Self::LoggingIn => "LOGGING_IN",
            Self::Connecting => "CONNECTING",
            Self::Identifying => "IDENTIFYING",
            Self::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            Self::Loading => "LOADING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::ReconnectQueued => "RECONNECT_QUEUED",
            Self::WaitingToReconnect => "WAITING_TO_RECONNECT",
            Self::Reconnecting => "RECONNECTING",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
