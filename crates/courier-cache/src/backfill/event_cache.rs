//! Backfill cache for dispatches with unresolved dependencies
//!
//! Entries are keyed by the missing entity and age by the number of
//! dispatches processed since they were parked, not by wall-clock time.

use courier_core::Snowflake;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Continuation that re-dispatches a parked event: `(sequence, payload)`
pub type Replay = Box<dyn FnOnce(u64, Value) + Send + 'static>;

/// Kind of entity a parked event is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Guild,
    Channel,
    User,
}

impl CacheKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Guild => "guild",
            Self::Channel => "channel",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

struct PendingEvent {
    sequence: u64,
    /// Processed-dispatch counter at insertion
    inserted_at: u64,
    payload: Value,
    replay: Replay,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<(CacheKind, Snowflake), Vec<PendingEvent>>,
    processed: u64,
}

/// Parks raw dispatches until their dependency resolves
pub struct EventCache {
    inner: Mutex<Inner>,
    eviction_threshold: u64,
}

impl EventCache {
    /// Create a cache that drops entries after `eviction_threshold` processed dispatches
    #[must_use]
    pub fn new(eviction_threshold: u64) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            eviction_threshold: eviction_threshold.max(1),
        }
    }

    /// Park `payload` until `(kind, id)` resolves
    ///
    /// Returns false when an event with this sequence is already parked
    /// under this key.
    pub fn cache(
        &self,
        kind: CacheKind,
        id: Snowflake,
        sequence: u64,
        payload: Value,
        replay: Replay,
    ) -> bool {
        let mut inner = self.inner.lock();
        let inserted_at = inner.processed;
        let pending = inner.entries.entry((kind, id)).or_default();

        if pending.iter().any(|e| e.sequence == sequence) {
            tracing::trace!(%kind, %id, sequence, "Event already parked");
            return false;
        }

        pending.push(PendingEvent {
            sequence,
            inserted_at,
            payload,
            replay,
        });
        tracing::debug!(%kind, %id, sequence, "Parked event until dependency resolves");
        true
    }

    /// Replay every event parked under `(kind, id)` in insertion order
    ///
    /// The continuations run after the lock is released, so they may park
    /// events of their own. Returns the number of events replayed.
    pub fn play_back(&self, kind: CacheKind, id: Snowflake) -> usize {
        let pending = self.inner.lock().entries.remove(&(kind, id));
        let Some(pending) = pending else {
            return 0;
        };

        let count = pending.len();
        tracing::debug!(%kind, %id, count, "Replaying parked events");
        for event in pending {
            (event.replay)(event.sequence, event.payload);
        }
        count
    }

    /// Record one processed dispatch and evict entries that aged out
    ///
    /// Returns the number of evicted events.
    pub fn processed(&self) -> usize {
        let evicted = {
            let mut inner = self.inner.lock();
            inner.processed += 1;
            let now = inner.processed;
            let threshold = self.eviction_threshold;

            let mut evicted = Vec::new();
            inner.entries.retain(|&(kind, id), pending| {
                pending.retain(|event| {
                    if now - event.inserted_at >= threshold {
                        evicted.push((kind, id, event.sequence));
                        false
                    } else {
                        true
                    }
                });
                !pending.is_empty()
            });
            evicted
        };

        for (kind, id, sequence) in &evicted {
            tracing::warn!(
                kind = %kind,
                id = %id,
                sequence,
                "Dropping parked event, dependency never resolved"
            );
        }
        evicted.len()
    }

    /// Number of events parked under `(kind, id)`
    pub fn pending(&self, kind: CacheKind, id: Snowflake) -> usize {
        self.inner
            .lock()
            .entries
            .get(&(kind, id))
            .map_or(0, Vec::len)
    }

    /// Total number of parked events
    pub fn len(&self) -> usize {
        self.inner.lock().entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drop every parked event without replaying it
    pub fn clear(&self) -> usize {
        let dropped: Vec<_> = self.inner.lock().entries.drain().collect();
        let count = dropped.iter().map(|(_, pending)| pending.len()).sum();
        if count > 0 {
            tracing::debug!(count, "Cleared backfill cache");
        }
        count
    }
}

impl std::fmt::Debug for EventCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCache")
            .field("pending", &self.len())
            .field("eviction_threshold", &self.eviction_threshold)
            .finish()
    }
}
