//! Transport seam
//!
//! The connection state machine only sees these traits. The real
//! implementation runs over `tokio-tungstenite`; tests script their own.

mod tungstenite;

pub use self::tungstenite::TungsteniteConnector;

use async_trait::async_trait;
use std::sync::Arc;

/// Something that happened on the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Binary(Vec<u8>),
    /// The socket closed; `code` is missing when it dropped without a close frame
    Closed { code: Option<u16>, reason: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Failed to send: {0}")]
    Send(String),

    #[error("Transport already closed")]
    Closed,
}

/// Write half of a connection
#[async_trait]
pub trait TransportSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}

/// Read half of a connection
#[async_trait]
pub trait TransportStream: Send {
    /// Next event; `None` once the stream has ended
    ///
    /// Must be cancel safe: the reader races it against its close deadline.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

pub type BoxSink = Box<dyn TransportSink>;
pub type BoxStream = Box<dyn TransportStream>;

/// Write half shared by the sender task and whoever closes the connection
pub type SharedSink = Arc<tokio::sync::Mutex<BoxSink>>;

/// Opens connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<(BoxSink, BoxStream), TransportError>;
}
