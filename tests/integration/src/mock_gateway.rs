//! Mock gateway
//!
//! Speaks the handshake over a real websocket: HELLO, then READY and one
//! GUILD_CREATE for an identify, or a replayed MESSAGE_CREATE and RESUMED
//! for a resume. Frames are zlib-stream compressed when the client asks
//! for it in the query string.

use crate::fixtures;
use crate::mock_api::MockState;
use anyhow::Result;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use flate2::{Compress, Compression, FlushCompress};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub const HEARTBEAT_INTERVAL_MS: u64 = 1_000;

pub async fn upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<MockState>>,
) -> Response {
    let compress = params.get("compress").is_some_and(|v| v == "zlib-stream");
    ws.on_upgrade(move |socket| async move {
        state.connections.fetch_add(1, Ordering::SeqCst);
        state.compressed.lock().push(compress);
        run_session(socket, Arc::clone(&state), compress).await.ok();
        state.disconnects.fetch_add(1, Ordering::SeqCst);
    })
}

/// Server half of one connection
struct Outbound {
    sink: SplitSink<WebSocket, Message>,
    compressor: Option<Compress>,
    seq: u64,
}

impl Outbound {
    async fn send(&mut self, frame: &Value) -> Result<()> {
        let text = frame.to_string();
        let message = match &mut self.compressor {
            Some(compressor) => {
                let mut out = Vec::with_capacity(text.len() * 2 + 64);
                compressor.compress_vec(text.as_bytes(), &mut out, FlushCompress::Sync)?;
                Message::Binary(out)
            }
            None => Message::Text(text),
        };
        self.sink.send(message).await?;
        Ok(())
    }

    async fn dispatch(&mut self, event: &str, data: Value) -> Result<()> {
        self.seq += 1;
        let frame = json!({ "op": 0, "s": self.seq, "t": event, "d": data });
        self.send(&frame).await
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code,
            reason: "mock gateway close".into(),
        };
        self.sink.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}

async fn run_session(socket: WebSocket, state: Arc<MockState>, compress: bool) -> Result<()> {
    let (sink, mut stream) = socket.split();
    let mut out = Outbound {
        sink,
        compressor: compress.then(|| Compress::new(Compression::default(), true)),
        seq: 0,
    };

    out.send(&json!({ "op": 10, "d": { "heartbeat_interval": HEARTBEAT_INTERVAL_MS } }))
        .await?;

    while let Some(message) = stream.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let frame: Value = serde_json::from_str(&text)?;
        state.frames.lock().push(frame.clone());

        match frame["op"].as_u64() {
            // Heartbeat
            Some(1) => out.send(&json!({ "op": 11 })).await?,
            // Identify
            Some(2) => {
                let n = state.identifies.fetch_add(1, Ordering::SeqCst) + 1;
                out.seq = 0;
                out.dispatch("READY", fixtures::ready(&format!("session-{n}")))
                    .await?;
                out.dispatch("GUILD_CREATE", fixtures::guild_create()).await?;

                let close = state.close_after_ready.lock().take();
                if let Some(code) = close {
                    out.close(code).await?;
                    break;
                }
            }
            // Resume: replay one missed message, then confirm
            Some(6) => {
                state.resumes.lock().push(frame["d"].clone());
                out.seq = frame["d"]["seq"].as_u64().unwrap_or(0);
                let missed = fixtures::message(
                    fixtures::unique_id(),
                    fixtures::CHANNEL_ID,
                    "sent while you were away",
                );
                out.dispatch("MESSAGE_CREATE", missed).await?;
                out.dispatch("RESUMED", json!({})).await?;
            }
            _ => {}
        }
    }
    Ok(())
}
