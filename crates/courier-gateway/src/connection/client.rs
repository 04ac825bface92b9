//! Gateway connection state machine
//!
//! A [`GatewayClient`] owns at most one transport at a time. Each transport
//! gets three tasks: a reader that decodes and handles inbound frames, a
//! sender that drains the outbound queue within the send budget, and a
//! heartbeat timer started on HELLO. Every connect and reconnect attempt is
//! run through the shared [`ConnectScheduler`].

use super::nodes::{ReconnectNode, StartNode};
use super::{GatewayUrlResolver, StaticUrl};
use crate::compression::ZlibStream;
use crate::error::{GatewayError, GatewayResult};
use crate::events::{DispatchType, GatewayEvent, EVENT_CHANNEL_CAPACITY};
use crate::handlers::{DispatchContext, DispatchRouter, HandleOutcome};
use crate::protocol::{
    CloseCode, GatewayMessage, IdentifyPayload, OpCode, ResumePayload, NORMAL_CLOSURE,
};
use crate::scheduler::{ConnectError, ConnectScheduler, NodeKey};
use crate::throttle::{run_sender, OutboundQueue, SendWindow};
use crate::transport::{BoxStream, SharedSink, TransportConnector, TransportEvent, TungsteniteConnector};
use courier_cache::{EntityStore, EventCache};
use courier_common::{ClientConfig, GatewayConfig};
use courier_core::{ConnectionStatus, StatusCell, StatusError};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Default websocket endpoint when nothing else is configured
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Close reason the client uses when it throws the session away
pub const INVALIDATE_REASON: &str = "INVALIDATE_SESSION";
const RECONNECT_REASON: &str = "OP 7: RECONNECT";
const MALFORMED_REASON: &str = "MALFORMED_PACKAGE";
const ZOMBIE_REASON: &str = "Heartbeat not acknowledged";
const SHUTDOWN_REASON: &str = "Shutting down";

/// How long a close may go unanswered before the transport is dropped
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

struct SessionState {
    session_id: Option<String>,
    sequence: Option<u64>,
    gateway_url: Option<String>,
    reconnect_delay: Duration,
    identify_sent_at: Option<Instant>,
    heartbeat_acked: bool,
    last_heartbeat: Option<Instant>,
    ping: Option<Duration>,
    /// Code and reason of a close this client asked for
    close_intent: Option<(u16, String)>,
    /// When the reader stops waiting for the peer to echo that close
    close_deadline: Option<Instant>,
    sink: Option<SharedSink>,
    /// Bumped for every new transport
    generation: u64,
    /// READY seen, initial load not finished
    processing_ready: bool,
    terminal_reason: Option<String>,
}

#[derive(Default)]
struct Tasks {
    reader: Option<JoinHandle<()>>,
    sender: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

/// One shard's gateway connection
pub struct GatewayClient {
    id: u64,
    token: String,
    shard: [u32; 2],
    config: GatewayConfig,
    status: Arc<StatusCell>,
    scheduler: ConnectScheduler,
    connector: Arc<dyn TransportConnector>,
    resolver: Arc<dyn GatewayUrlResolver>,
    store: Arc<EntityStore>,
    backfill: Arc<EventCache>,
    router: Arc<DispatchRouter>,
    events: broadcast::Sender<GatewayEvent>,
    outbound: Arc<OutboundQueue>,
    window: Arc<Mutex<SendWindow>>,
    state: Mutex<SessionState>,
    tasks: Mutex<Tasks>,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
    close_requested: Notify,
    this: Weak<GatewayClient>,
}

/// Builder for [`GatewayClient`]
pub struct GatewayClientBuilder {
    token: String,
    shard: [u32; 2],
    config: GatewayConfig,
    backfill_threshold: u64,
    status: Option<Arc<StatusCell>>,
    scheduler: Option<ConnectScheduler>,
    connector: Option<Arc<dyn TransportConnector>>,
    resolver: Option<Arc<dyn GatewayUrlResolver>>,
    store: Option<Arc<EntityStore>>,
}

impl GatewayClientBuilder {
    /// Share a status cell with the owner of this connection
    #[must_use]
    pub fn status(mut self, status: Arc<StatusCell>) -> Self {
        self.status = Some(status);
        self
    }

    /// Share a scheduler with the other shards of the same credential
    #[must_use]
    pub fn scheduler(mut self, scheduler: ConnectScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn TransportConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn GatewayUrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Arc<GatewayClient> {
        let config = self.config;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = self.store.unwrap_or_default();
        let backfill = Arc::new(EventCache::new(self.backfill_threshold));
        let router = DispatchRouter::new(DispatchContext::new(
            Arc::clone(&store),
            Arc::clone(&backfill),
            events.clone(),
        ));
        let resolver = self.resolver.unwrap_or_else(|| {
            let url = config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
            Arc::new(StaticUrl(url)) as Arc<dyn GatewayUrlResolver>
        });
        let window = SendWindow::new(config.send_budget, config.send_reserved, config.send_window);

        Arc::new_cyclic(|this| GatewayClient {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            token: self.token,
            shard: self.shard,
            status: self.status.unwrap_or_default(),
            scheduler: self
                .scheduler
                .unwrap_or_else(|| ConnectScheduler::new(config.identify_interval)),
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(TungsteniteConnector) as Arc<dyn TransportConnector>),
            resolver,
            store,
            backfill,
            router,
            events,
            outbound: Arc::new(OutboundQueue::new()),
            window: Arc::new(Mutex::new(window)),
            state: Mutex::new(SessionState {
                session_id: None,
                sequence: None,
                gateway_url: None,
                reconnect_delay: config.initial_reconnect_delay,
                identify_sent_at: None,
                heartbeat_acked: true,
                last_heartbeat: None,
                ping: None,
                close_intent: None,
                close_deadline: None,
                sink: None,
                generation: 0,
                processing_ready: false,
                terminal_reason: None,
            }),
            tasks: Mutex::new(Tasks::default()),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            close_requested: Notify::new(),
            config,
            this: this.clone(),
        })
    }
}

impl GatewayClient {
    pub fn builder(config: &ClientConfig) -> GatewayClientBuilder {
        GatewayClientBuilder {
            token: config.token.clone(),
            shard: config.shard.as_array(),
            config: config.gateway.clone(),
            backfill_threshold: config.cache.backfill_eviction_threshold,
            status: None,
            scheduler: None,
            connector: None,
            resolver: None,
            store: None,
        }
    }

    /// Process-unique id, used as the scheduler key
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn shard(&self) -> [u32; 2] {
        self.shard
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    pub fn status_cell(&self) -> &Arc<StatusCell> {
        &self.status
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn backfill(&self) -> &Arc<EventCache> {
        &self.backfill
    }

    pub fn scheduler(&self) -> &ConnectScheduler {
        &self.scheduler
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().session_id.clone()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.state.lock().sequence
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn ping(&self) -> Option<Duration> {
        self.state.lock().ping
    }

    /// Why the connection shut down, once it has
    pub fn terminal_reason(&self) -> Option<String> {
        self.state.lock().terminal_reason.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Queue the first connect attempt
    pub fn start(self: &Arc<Self>) {
        if self.is_shutdown() {
            return;
        }
        tracing::debug!(shard = ?self.shard, id = self.id, "Queueing initial connect");
        self.scheduler.append(Arc::new(StartNode::new(self)));
    }

    pub async fn await_ready(&self) -> Result<(), StatusError> {
        self.status.await_ready().await
    }

    /// Queue an application frame
    ///
    /// Heartbeat, identify and resume frames go ahead of everything else.
    ///
    /// # Errors
    /// Fails after shutdown or when the frame cannot be encoded.
    pub fn send(&self, message: &GatewayMessage) -> GatewayResult<()> {
        if self.is_shutdown() {
            return Err(GatewayError::Shutdown);
        }
        let frame = message.to_json()?;
        if message.op.is_priority() {
            self.outbound.push_priority(frame);
        } else {
            self.outbound.push(frame);
        }
        Ok(())
    }

    /// Throw away the session and everything learned through it
    pub fn invalidate(&self) {
        {
            let mut state = self.state.lock();
            state.session_id = None;
            state.sequence = None;
            state.processing_ready = false;
        }
        let dropped = self.outbound.clear_regular();
        self.store.clear();
        let parked = self.backfill.clear();
        self.router.reset_initial_load();

        tracing::info!(shard = ?self.shard, dropped, parked, "Session invalidated");
    }

    /// Invalidate the session and reconnect with a fresh identify
    pub async fn reset_session(&self) {
        if self.is_shutdown() {
            return;
        }
        tracing::info!(shard = ?self.shard, "Resetting session");
        self.invalidate();
        self.close_transport(NORMAL_CLOSURE, INVALIDATE_REASON).await;
    }

    /// Close the transport for good and release every task
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(shard = ?self.shard, "Shutting down gateway connection");

        self.shutdown_notify.notify_waiters();
        self.scheduler.remove_connection(self.id);
        self.set_status(ConnectionStatus::ShuttingDown);
        self.close_transport(NORMAL_CLOSURE, SHUTDOWN_REASON).await;

        let reader = self.tasks.lock().reader.take();
        if let Some(mut reader) = reader {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut reader).await.is_err() {
                tracing::debug!("Reader did not stop in time, aborting");
                reader.abort();
            }
        }

        self.finish_shutdown("Shutdown requested");
    }

    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        let old = self.status.set(status);
        if old != status && old != ConnectionStatus::Shutdown {
            self.emit(GatewayEvent::StatusChanged { old, new: status });
        }
    }

    fn emit(&self, event: GatewayEvent) {
        let _ = self.events.send(event);
    }

    /// Open a transport and start its tasks
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<(), ConnectError> {
        if self.is_shutdown() {
            return Ok(());
        }
        self.set_status(ConnectionStatus::Connecting);

        let url = self.gateway_url().await.map_err(|e| {
            tracing::warn!(shard = ?self.shard, error = %e, "Could not resolve gateway URL");
            ConnectError::Recoverable(e.to_string())
        })?;

        let (mut sink, stream) = match self.connector.connect(&url).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(shard = ?self.shard, %url, error = %e, "Failed to connect to gateway");
                self.state.lock().gateway_url = None;
                return Err(ConnectError::Recoverable(e.to_string()));
            }
        };

        if self.is_shutdown() {
            let _ = sink.close(NORMAL_CLOSURE, SHUTDOWN_REASON).await;
            return Ok(());
        }

        let sink: SharedSink = Arc::new(tokio::sync::Mutex::new(sink));
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.sink = Some(Arc::clone(&sink));
            state.heartbeat_acked = true;
            state.close_intent = None;
            state.close_deadline = None;
            state.generation
        };
        // Handshake frames belong to the transport they were made for
        self.outbound.clear_priority();
        self.set_status(ConnectionStatus::Identifying);

        let sender = {
            let queue = Arc::clone(&self.outbound);
            let window = Arc::clone(&self.window);
            tokio::spawn(async move {
                if let Err(e) = run_sender(queue, window, sink).await {
                    tracing::debug!(error = %e, "Sender stopped");
                }
            })
        };
        let reader = tokio::spawn(read_loop(Arc::clone(self), stream, generation));
        {
            let mut tasks = self.tasks.lock();
            if let Some(old) = tasks.sender.replace(sender) {
                old.abort();
            }
            tasks.reader = Some(reader);
        }

        tracing::info!(shard = ?self.shard, generation, "Connected to gateway");
        Ok(())
    }

    async fn gateway_url(&self) -> GatewayResult<String> {
        let cached = self.state.lock().gateway_url.clone();
        let base = match cached {
            Some(url) => url,
            None => {
                let url = self.resolver.resolve().await?;
                self.state.lock().gateway_url = Some(url.clone());
                url
            }
        };

        let separator = if base.contains('?') { '&' } else { '?' };
        let mut url = format!("{base}{separator}encoding=json&v={}", self.config.version);
        if self.config.compress {
            url.push_str("&compress=zlib-stream");
        }
        Ok(url)
    }

    /// Wait until the session is loading, a reconnect is queued or the
    /// connection shut down
    pub(crate) async fn await_loading(&self) {
        let result = self
            .status
            .await_status(
                ConnectionStatus::Loading,
                &[ConnectionStatus::ReconnectQueued],
            )
            .await;
        if let Err(e) = result {
            tracing::debug!(error = %e, "Stopped waiting for the session to load");
        }
    }

    /// Sleep unless shutdown comes first; returns false if it did
    pub(crate) async fn sleep_unless_shutdown(&self, duration: Duration) -> bool {
        let notified = self.shutdown_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_shutdown() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            () = notified => false,
        }
    }

    /// Current backoff; the next one doubles up to the configured cap
    pub(crate) fn next_reconnect_delay(&self) -> Duration {
        let mut state = self.state.lock();
        let delay = state.reconnect_delay;
        state.reconnect_delay = (delay * 2).min(self.config.max_reconnect_delay);
        delay
    }

    async fn close_transport(&self, code: u16, reason: &str) {
        let sink = {
            let mut state = self.state.lock();
            let Some(sink) = state.sink.clone() else {
                return;
            };
            if state.close_intent.is_none() {
                state.close_intent = Some((code, reason.to_string()));
                state.close_deadline = Some(Instant::now() + CLOSE_TIMEOUT);
            }
            sink
        };
        self.close_requested.notify_waiters();

        tracing::debug!(code, reason, "Closing gateway transport");
        let sent = tokio::time::timeout(CLOSE_TIMEOUT, async {
            let mut sink = sink.lock().await;
            sink.close(code, reason).await
        })
        .await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Close frame not sent"),
            Err(_) => tracing::debug!("Timed out sending the close frame"),
        }
    }

    /// Deadline for the peer to answer a close on this transport, if one was sent
    fn close_deadline(&self, generation: u64) -> Option<Instant> {
        let state = self.state.lock();
        if state.generation == generation {
            state.close_deadline
        } else {
            None
        }
    }

    /// Handle one decoded frame; returns a close to perform, if any
    fn handle_frame(&self, text: &str) -> Option<(u16, &'static str)> {
        let message = match GatewayMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, frame = %text, "Ignoring malformed gateway frame");
                return None;
            }
        };

        match message.op {
            OpCode::Dispatch => {
                self.on_dispatch(message);
                None
            }
            OpCode::Heartbeat => {
                tracing::debug!("Heartbeat requested by the gateway");
                let seq = self.state.lock().sequence;
                self.queue_heartbeat(seq);
                None
            }
            OpCode::Reconnect => {
                tracing::info!(shard = ?self.shard, "Gateway asked for a reconnect");
                Some((CloseCode::UnknownError.as_u16(), RECONNECT_REASON))
            }
            OpCode::InvalidSession => {
                if message.is_resumable() {
                    tracing::info!(shard = ?self.shard, "Session invalidated, resume still possible");
                    Some((CloseCode::UnknownError.as_u16(), INVALIDATE_REASON))
                } else {
                    tracing::warn!(shard = ?self.shard, "Session invalidated, identifying again");
                    self.invalidate();
                    Some((NORMAL_CLOSURE, INVALIDATE_REASON))
                }
            }
            OpCode::Hello => {
                match message.as_hello() {
                    Some(hello) => self.on_hello(hello.interval()),
                    None => tracing::warn!(payload = %message.d, "HELLO without a heartbeat interval"),
                }
                None
            }
            OpCode::HeartbeatAck => {
                let mut state = self.state.lock();
                state.heartbeat_acked = true;
                state.ping = state.last_heartbeat.map(|sent| sent.elapsed());
                tracing::trace!(ping = ?state.ping, "Heartbeat acknowledged");
                None
            }
            other => {
                tracing::debug!(op = %other, "Ignoring unexpected opcode");
                None
            }
        }
    }

    fn on_hello(&self, interval: Duration) {
        tracing::debug!(?interval, "Received HELLO");
        self.start_heartbeat(interval);

        let frame = {
            let mut state = self.state.lock();
            match state.session_id.clone() {
                Some(session_id) => {
                    tracing::info!(shard = ?self.shard, %session_id, seq = ?state.sequence, "Resuming session");
                    GatewayMessage::resume(&ResumePayload {
                        token: self.token.clone(),
                        session_id,
                        seq: state.sequence,
                    })
                }
                None => {
                    state.sequence = None;
                    state.identify_sent_at = Some(Instant::now());
                    tracing::info!(shard = ?self.shard, "Identifying");
                    GatewayMessage::identify(&IdentifyPayload::new(
                        self.token.clone(),
                        self.config.large_threshold,
                        self.shard,
                    ))
                }
            }
        };

        match frame.and_then(|f| f.to_json()) {
            Ok(json) => self.outbound.push_priority(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode handshake frame");
                return;
            }
        }
        self.set_status(ConnectionStatus::AwaitingConfirmation);
    }

    fn on_dispatch(&self, message: GatewayMessage) {
        if let Some(seq) = message.s {
            self.state.lock().sequence = Some(seq);
        }
        let Some(event) = message.t.as_deref() else {
            tracing::warn!(seq = ?message.s, "Dispatch without an event name");
            return;
        };

        match DispatchType::from_name(event) {
            Some(DispatchType::Ready) => self.on_ready(&message.d),
            Some(DispatchType::Resumed) => {
                self.on_resumed();
                return;
            }
            _ => {}
        }

        let seq = message.s.unwrap_or_default();
        if self.router.dispatch(event, seq, &message.d) == HandleOutcome::InitialLoadComplete {
            self.finish_loading();
        }
    }

    fn on_ready(&self, data: &Value) {
        let Some(session_id) = data.get("session_id").and_then(Value::as_str) else {
            tracing::warn!("READY without a session id");
            return;
        };
        {
            let mut state = self.state.lock();
            state.session_id = Some(session_id.to_string());
            state.reconnect_delay = self.config.initial_reconnect_delay;
            state.processing_ready = true;
        }
        tracing::info!(shard = ?self.shard, session_id, "Session established");
        self.set_status(ConnectionStatus::Loading);
    }

    fn on_resumed(&self) {
        let loading = {
            let mut state = self.state.lock();
            state.reconnect_delay = self.config.initial_reconnect_delay;
            state.processing_ready
        };
        tracing::info!(shard = ?self.shard, "Session resumed");
        self.set_status(if loading {
            ConnectionStatus::Loading
        } else {
            ConnectionStatus::Connected
        });
        self.emit(GatewayEvent::Resumed);
    }

    fn finish_loading(&self) {
        self.state.lock().processing_ready = false;
        let guilds = self.store.guilds.len();
        tracing::info!(shard = ?self.shard, guilds, "Initial load complete");
        self.set_status(ConnectionStatus::Connected);
        self.emit(GatewayEvent::Ready {
            user: self.store.self_user(),
            guilds,
        });
    }

    fn start_heartbeat(&self, interval: Duration) {
        let Some(client) = self.this.upgrade() else {
            return;
        };
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !client.heartbeat_tick() {
                    tracing::warn!(shard = ?client.shard, "Heartbeat not acknowledged, closing zombie connection");
                    client
                        .close_transport(CloseCode::UnknownError.as_u16(), ZOMBIE_REASON)
                        .await;
                    break;
                }
            }
        });

        if let Some(old) = self.tasks.lock().heartbeat.replace(handle) {
            old.abort();
        }
    }

    /// Send the periodic heartbeat; false if the last one was never acknowledged
    fn heartbeat_tick(&self) -> bool {
        let seq = {
            let mut state = self.state.lock();
            if !state.heartbeat_acked {
                return false;
            }
            state.heartbeat_acked = false;
            state.last_heartbeat = Some(Instant::now());
            state.sequence
        };
        self.queue_heartbeat(seq);
        true
    }

    fn queue_heartbeat(&self, seq: Option<u64>) {
        match GatewayMessage::heartbeat(seq).to_json() {
            Ok(frame) => self.outbound.push_priority(frame),
            Err(e) => tracing::error!(error = %e, "Failed to encode heartbeat"),
        }
    }

    async fn on_disconnected(self: &Arc<Self>, code: Option<u16>, reason: String, generation: u64) {
        let (code, reason, by_client) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.sink = None;
            state.close_deadline = None;
            match state.close_intent.take() {
                Some((code, reason)) => (Some(code), reason, true),
                None => (code, reason, false),
            }
        };
        self.release_tasks();

        if self.is_shutdown() {
            self.finish_shutdown("Shutdown requested");
            return;
        }

        self.set_status(ConnectionStatus::Disconnected);
        if by_client {
            tracing::info!(shard = ?self.shard, ?code, %reason, "Closed gateway connection");
        } else {
            tracing::warn!(shard = ?self.shard, ?code, %reason, "Gateway connection lost");
        }

        if !CloseCode::is_recoverable(code) {
            let reason = match code.and_then(CloseCode::from_u16) {
                Some(close) => close.to_string(),
                None => format!("{code:?}: {reason}"),
            };
            tracing::error!(shard = ?self.shard, %reason, "Gateway closed with a fatal code");
            self.finish_shutdown(reason);
            return;
        }
        if !self.config.auto_reconnect {
            self.finish_shutdown("Connection lost and auto-reconnect is disabled");
            return;
        }

        if by_client && code == Some(NORMAL_CLOSURE) && reason == INVALIDATE_REASON {
            self.invalidate();
        }

        self.wait_identify_throttle().await;
        if self.is_shutdown() {
            return;
        }

        self.set_status(ConnectionStatus::ReconnectQueued);
        self.scheduler.append(Arc::new(ReconnectNode::new(self)));
    }

    /// Identifies are limited per credential; don't reconnect straight after one
    async fn wait_identify_throttle(&self) {
        let wait = self
            .state
            .lock()
            .identify_sent_at
            .take()
            .and_then(|sent| (sent + self.config.identify_interval).checked_duration_since(Instant::now()));

        if let Some(wait) = wait {
            tracing::info!(shard = ?self.shard, ?wait, "Identify sent recently, backing off");
            self.sleep_unless_shutdown(wait).await;
        }
    }

    /// Drop the heartbeat and sender, and detach the reader
    fn release_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        if let Some(heartbeat) = tasks.heartbeat {
            heartbeat.abort();
        }
        if let Some(sender) = tasks.sender {
            sender.abort();
        }
    }

    fn finish_shutdown(&self, reason: impl Into<String>) {
        {
            let mut state = self.state.lock();
            if state.terminal_reason.is_none() {
                state.terminal_reason = Some(reason.into());
            }
            state.sink = None;
            state.processing_ready = false;
        }
        self.shutdown.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_waiters();
        self.scheduler.remove_connection(self.id);

        self.set_status(ConnectionStatus::ShuttingDown);
        self.release_tasks();
        self.set_status(ConnectionStatus::Shutdown);
    }

    pub(crate) fn start_key(&self) -> NodeKey {
        NodeKey::start(self.id)
    }

    pub(crate) fn reconnect_key(&self) -> NodeKey {
        NodeKey::reconnect(self.id)
    }
}

async fn read_loop(client: Arc<GatewayClient>, mut stream: BoxStream, generation: u64) {
    // One inflater per transport; the compressed stream starts over on every connect
    let mut inflater = ZlibStream::new();

    let (code, reason) = loop {
        let close_requested = client.close_requested.notified();
        tokio::pin!(close_requested);
        close_requested.as_mut().enable();
        let deadline = client.close_deadline(generation);

        // A peer that never echoes our close must not keep the transport alive
        let event = tokio::select! {
            event = stream.next_event() => event,
            () = &mut close_requested => continue,
            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                tracing::warn!(shard = ?client.shard, "Close not acknowledged, dropping the transport");
                break (None, "Close not acknowledged".to_string());
            }
        };
        let Some(event) = event else {
            break (None, "Stream ended".to_string());
        };

        let text = match event {
            TransportEvent::Text(text) => text,
            TransportEvent::Binary(bytes) => match inflater.push(&bytes) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, len = bytes.len(), "Failed to decompress gateway frame");
                    client
                        .close_transport(CloseCode::UnknownError.as_u16(), MALFORMED_REASON)
                        .await;
                    continue;
                }
            },
            TransportEvent::Closed { code, reason } => break (code, reason),
        };

        if let Some((code, reason)) = client.handle_frame(&text) {
            client.close_transport(code, reason).await;
        }
    };
    drop(stream);

    client.on_disconnected(code, reason, generation).await;
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GatewayClient")
            .field("id", &self.id)
            .field("shard", &self.shard)
            .field("status", &self.status.get())
            .field("session_id", &state.session_id)
            .field("sequence", &state.sequence)
            .finish_non_exhaustive()
    }
}
