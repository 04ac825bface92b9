use super::{BoxSink, BoxStream, TransportConnector, TransportError, TransportEvent, TransportSink, TransportStream};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`TransportConnector`] over `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

struct WsSink(SplitSink<Socket, Message>);

struct WsStream(SplitStream<Socket>);

#[async_trait]
impl TransportConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<(BoxSink, BoxStream), TransportError> {
        let (socket, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = socket.split();
        Ok((Box::new(WsSink(sink)), Box::new(WsStream(stream))))
    }
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.0
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[async_trait]
impl TransportStream for WsStream {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            let event = match self.0.next().await? {
                Ok(Message::Text(text)) => TransportEvent::Text(text),
                Ok(Message::Binary(bytes)) => TransportEvent::Binary(bytes),
                Ok(Message::Close(frame)) => TransportEvent::Closed {
                    code: frame.as_ref().map(|f| u16::from(f.code)),
                    reason: frame.map(|f| f.reason.into_owned()).unwrap_or_default(),
                },
                // Pings are answered by tungstenite itself
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket read failed");
                    TransportEvent::Closed {
                        code: None,
                        reason: e.to_string(),
                    }
                }
            };
            return Some(event);
        }
    }
}
