use super::SendWindow;
use crate::transport::{SharedSink, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Frames {
    priority: VecDeque<String>,
    regular: VecDeque<String>,
}

/// Pending outbound frames, priority frames first
#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: Mutex<Frames>,
    notify: Notify,
}

enum Next {
    Send(String),
    Wait(Instant),
    Idle,
}

impl OutboundQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a heartbeat, identify or resume frame
    pub fn push_priority(&self, frame: String) {
        self.frames.lock().priority.push_back(frame);
        self.notify.notify_one();
    }

    pub fn push(&self, frame: String) {
        self.frames.lock().regular.push_back(frame);
        self.notify.notify_one();
    }

    /// Drop pending regular frames, returning how many were dropped
    pub fn clear_regular(&self) -> usize {
        let mut frames = self.frames.lock();
        let dropped = frames.regular.len();
        frames.regular.clear();
        dropped
    }

    /// Priority frames belong to one connection and are dropped on reconnect
    pub fn clear_priority(&self) -> usize {
        let mut frames = self.frames.lock();
        let dropped = frames.priority.len();
        frames.priority.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        let frames = self.frames.lock();
        frames.priority.len() + frames.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next(&self, window: &Mutex<SendWindow>) -> Next {
        let mut frames = self.frames.lock();
        let priority = if frames.priority.is_empty() {
            if frames.regular.is_empty() {
                return Next::Idle;
            }
            false
        } else {
            true
        };

        let now = Instant::now();
        let mut window = window.lock();
        match window.try_acquire(priority, now) {
            Ok(()) => {
                let queue = if priority {
                    &mut frames.priority
                } else {
                    &mut frames.regular
                };
                queue.pop_front().map_or(Next::Idle, Next::Send)
            }
            Err(until) => {
                if window.should_warn(now) {
                    tracing::warn!(
                        pending = frames.priority.len() + frames.regular.len(),
                        "Outbound frames throttled by the send budget"
                    );
                }
                Next::Wait(until)
            }
        }
    }
}

/// Drain `queue` into `sink` within the budget of `window`
///
/// Runs until the sink fails. One sender task exists per connection.
///
/// # Errors
/// Returns the first write failure.
pub async fn run_sender(
    queue: Arc<OutboundQueue>,
    window: Arc<Mutex<SendWindow>>,
    sink: SharedSink,
) -> Result<(), TransportError> {
    loop {
        match queue.next(&window) {
            Next::Send(frame) => {
                tracing::trace!(len = frame.len(), "Sending frame");
                sink.lock().await.send_text(frame).await?;
            }
            Next::Wait(until) => {
                // Woken early when a priority frame arrives
                tokio::select! {
                    () = tokio::time::sleep_until(until) => {}
                    () = queue.notify.notified() => {}
                }
            }
            Next::Idle => queue.notify.notified().await,
        }
    }
}
