//! Mock REST API
//!
//! Serves just enough of the API for login, gateway discovery and message
//! sends, with scripted rate-limit replies and per-channel concurrency
//! tracking.

use crate::fixtures;
use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scripted reply to the next message send
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageReply {
    Ok,
    /// Success that leaves the bucket empty for `reset_after` seconds
    Exhausted { reset_after: f64 },
    /// 429 with a retry-after in seconds
    TooMany { retry_after: f64 },
    ServerError,
}

/// One message send as the server saw it
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub channel_id: u64,
    pub started: Instant,
    pub finished: Instant,
}

/// Shared state behind the mock API and gateway
pub struct MockState {
    gateway_url: String,

    // REST
    pub token_replies: Mutex<VecDeque<StatusCode>>,
    pub authorizations: Mutex<Vec<String>>,
    pub message_replies: Mutex<VecDeque<MessageReply>>,
    pub hits: Mutex<Vec<Hit>>,
    latency_ms: AtomicU64,
    in_flight: Mutex<HashMap<u64, usize>>,
    peak_per_channel: Mutex<HashMap<u64, usize>>,
    total_in_flight: AtomicUsize,
    pub total_peak: AtomicUsize,

    // Gateway
    pub close_after_ready: Mutex<Option<u16>>,
    pub connections: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub identifies: AtomicUsize,
    pub resumes: Mutex<Vec<Value>>,
    pub frames: Mutex<Vec<Value>>,
    pub compressed: Mutex<Vec<bool>>,
}

impl MockState {
    pub fn new(gateway_url: String) -> Self {
        Self {
            gateway_url,
            token_replies: Mutex::new(VecDeque::new()),
            authorizations: Mutex::new(Vec::new()),
            message_replies: Mutex::new(VecDeque::new()),
            hits: Mutex::new(Vec::new()),
            latency_ms: AtomicU64::new(0),
            in_flight: Mutex::new(HashMap::new()),
            peak_per_channel: Mutex::new(HashMap::new()),
            total_in_flight: AtomicUsize::new(0),
            total_peak: AtomicUsize::new(0),
            close_after_ready: Mutex::new(None),
            connections: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            identifies: AtomicUsize::new(0),
            resumes: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
            compressed: Mutex::new(Vec::new()),
        }
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    /// Queue replies for upcoming message sends
    pub fn script_messages(&self, replies: &[MessageReply]) {
        self.message_replies.lock().extend(replies.iter().copied());
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn peak_for(&self, channel_id: u64) -> usize {
        self.peak_per_channel
            .lock()
            .get(&channel_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().clone()
    }

    fn begin_request(&self, channel_id: u64) {
        {
            let mut in_flight = self.in_flight.lock();
            let current = in_flight.entry(channel_id).or_insert(0);
            *current += 1;
            let mut peaks = self.peak_per_channel.lock();
            let peak = peaks.entry(channel_id).or_insert(0);
            *peak = (*peak).max(*current);
        }
        let total = self.total_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.total_peak.fetch_max(total, Ordering::SeqCst);
    }

    fn end_request(&self, channel_id: u64, started: Instant) {
        if let Some(current) = self.in_flight.lock().get_mut(&channel_id) {
            *current -= 1;
        }
        self.total_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.hits.lock().push(Hit {
            channel_id,
            started,
            finished: Instant::now(),
        });
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_self(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().push(authorization);

    let status = state
        .token_replies
        .lock()
        .pop_front()
        .unwrap_or(StatusCode::OK);
    if status == StatusCode::OK {
        Json(fixtures::self_user()).into_response()
    } else {
        (
            status,
            Json(json!({ "message": format!("{status}"), "code": 0 })),
        )
            .into_response()
    }
}

pub async fn get_gateway(State(state): State<Arc<MockState>>) -> Json<Value> {
    Json(json!({ "url": state.gateway_url() }))
}

pub async fn create_message(
    State(state): State<Arc<MockState>>,
    Path(channel_id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    let started = Instant::now();
    state.begin_request(channel_id);

    let latency = Duration::from_millis(state.latency_ms.load(Ordering::SeqCst));
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
    let reply = state
        .message_replies
        .lock()
        .pop_front()
        .unwrap_or(MessageReply::Ok);
    state.end_request(channel_id, started);

    let content = body["content"].as_str().unwrap_or_default();
    let message = fixtures::message(fixtures::unique_id(), channel_id, content);

    match reply {
        MessageReply::Ok => Json(message).into_response(),
        MessageReply::Exhausted { reset_after } => (
            [
                ("x-ratelimit-limit", "5".to_string()),
                ("x-ratelimit-remaining", "0".to_string()),
                ("x-ratelimit-reset-after", reset_after.to_string()),
                ("x-ratelimit-bucket", format!("messages-{channel_id}")),
            ],
            Json(message),
        )
            .into_response(),
        MessageReply::TooMany { retry_after } => (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", retry_after.to_string())],
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": retry_after,
                "global": false,
            })),
        )
            .into_response(),
        MessageReply::ServerError => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "message": "upstream unavailable" })),
        )
            .into_response(),
    }
}
