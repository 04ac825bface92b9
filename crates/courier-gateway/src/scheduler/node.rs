use async_trait::async_trait;
use std::fmt;

/// What a queued node is going to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// First identify of a connection
    Start,
    /// Resume or re-identify after a drop
    Reconnect,
}

/// Identity of a queued node; appending an equal key replaces the old node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub connection_id: u64,
    pub kind: NodeKind,
}

impl NodeKey {
    #[must_use]
    pub const fn start(connection_id: u64) -> Self {
        Self {
            connection_id,
            kind: NodeKind::Start,
        }
    }

    #[must_use]
    pub const fn reconnect(connection_id: u64) -> Self {
        Self {
            connection_id,
            kind: NodeKind::Reconnect,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.connection_id)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectError {
    /// The attempt failed but may succeed later; the node is queued again
    #[error("Connect attempt failed: {0}")]
    Recoverable(String),

    /// The attempt was cut short; the node is queued again and a fresh
    /// worker takes over
    #[error("Connect attempt interrupted")]
    Interrupted,
}

/// One connect or resume attempt
#[async_trait]
pub trait ConnectNode: Send + Sync {
    fn key(&self) -> NodeKey;

    /// Run the attempt
    ///
    /// `is_last` is true when other nodes ran before this one in the same
    /// batch and nothing else is queued behind it, so there is no need to
    /// hold the queue until the session is loaded.
    async fn run(&self, is_last: bool) -> Result<(), ConnectError>;
}
