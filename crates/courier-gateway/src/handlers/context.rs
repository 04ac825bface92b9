use crate::events::GatewayEvent;
use courier_cache::{EntityStore, EventCache};
use courier_core::Snowflake;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared state the dispatch handlers work against
pub struct DispatchContext {
    pub store: Arc<EntityStore>,
    pub backfill: Arc<EventCache>,
    events: broadcast::Sender<GatewayEvent>,
    /// Guilds still expected before the initial load is complete
    initial_load: Mutex<Option<HashSet<Snowflake>>>,
}

impl DispatchContext {
    #[must_use]
    pub fn new(
        store: Arc<EntityStore>,
        backfill: Arc<EventCache>,
        events: broadcast::Sender<GatewayEvent>,
    ) -> Self {
        Self {
            store,
            backfill,
            events,
            initial_load: Mutex::new(None),
        }
    }

    /// Publish an event; having no subscribers is fine
    pub fn emit(&self, event: GatewayEvent) {
        let _ = self.events.send(event);
    }

    /// Start tracking the guilds listed in READY
    ///
    /// Returns true when there is nothing to wait for.
    pub fn begin_initial_load(&self, guilds: impl IntoIterator<Item = Snowflake>) -> bool {
        let pending: HashSet<Snowflake> = guilds.into_iter().collect();
        let done = pending.is_empty();
        *self.initial_load.lock() = (!done).then_some(pending);
        done
    }

    /// Mark one guild of the initial load as settled
    ///
    /// Returns true exactly once, when the last pending guild settles.
    pub fn settle_guild(&self, guild_id: Snowflake) -> bool {
        let mut initial_load = self.initial_load.lock();
        let Some(pending) = initial_load.as_mut() else {
            return false;
        };
        if !pending.remove(&guild_id) || !pending.is_empty() {
            return false;
        }
        *initial_load = None;
        true
    }

    pub fn is_loading(&self) -> bool {
        self.initial_load.lock().is_some()
    }

    /// Guilds still missing from the initial load
    pub fn pending_guilds(&self) -> usize {
        self.initial_load.lock().as_ref().map_or(0, HashSet::len)
    }

    pub fn reset_initial_load(&self) {
        *self.initial_load.lock() = None;
    }
}
