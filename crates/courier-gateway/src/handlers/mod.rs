//! Dispatch handlers
//!
//! Routes DISPATCH payloads by event name to the handler that writes them
//! into the entity store. A handler that finds a dependency missing asks for
//! the event to be parked in the backfill cache; the router re-enters itself
//! when the dependency shows up.

mod channel;
mod context;
mod error;
mod guild;
mod message;
mod presence;
mod ready;

pub use channel::ChannelCreateHandler;
pub use context::DispatchContext;
pub use error::{HandlerError, HandlerResult};
pub use guild::{GuildCreateHandler, GuildDeleteHandler};
pub use message::MessageCreateHandler;
pub use presence::PresenceHandler;
pub use ready::ReadyHandler;

use crate::events::DispatchType;
use courier_cache::CacheKind;
use courier_core::Snowflake;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// What happened to a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Done,
    /// Parked until the entity `(kind, id)` is known
    Deferred { kind: CacheKind, id: Snowflake },
    /// The last guild of the initial snapshot arrived
    InitialLoadComplete,
}

/// Handles one dispatch event type
pub trait DispatchHandler: Send + Sync {
    /// # Errors
    /// Returns an error when the payload cannot be understood.
    fn handle(&self, ctx: &DispatchContext, seq: u64, data: &Value) -> HandlerResult<HandleOutcome>;
}

/// Event-name keyed handler table
pub struct DispatchRouter {
    handlers: HashMap<DispatchType, Box<dyn DispatchHandler>>,
    ctx: DispatchContext,
    this: Weak<DispatchRouter>,
}

impl DispatchRouter {
    /// Router with the built-in handlers registered
    pub fn new(ctx: DispatchContext) -> Arc<Self> {
        let mut handlers: HashMap<DispatchType, Box<dyn DispatchHandler>> = HashMap::new();
        handlers.insert(DispatchType::Ready, Box::new(ReadyHandler));
        handlers.insert(DispatchType::GuildCreate, Box::new(GuildCreateHandler));
        handlers.insert(DispatchType::GuildDelete, Box::new(GuildDeleteHandler));
        handlers.insert(DispatchType::ChannelCreate, Box::new(ChannelCreateHandler));
        handlers.insert(DispatchType::MessageCreate, Box::new(MessageCreateHandler));
        handlers.insert(DispatchType::PresenceUpdate, Box::new(PresenceHandler));

        Arc::new_cyclic(|this| Self {
            handlers,
            ctx,
            this: this.clone(),
        })
    }

    pub fn context(&self) -> &DispatchContext {
        &self.ctx
    }

    /// Handle one inbound dispatch and count it towards backfill eviction
    pub fn dispatch(&self, event: &str, seq: u64, data: &Value) -> HandleOutcome {
        let outcome = self.route(event, seq, data);
        self.ctx.backfill.processed();
        outcome
    }

    /// Forget the initial-load tracker, as on session invalidation
    pub fn reset_initial_load(&self) {
        self.ctx.reset_initial_load();
    }

    fn route(&self, event: &str, seq: u64, data: &Value) -> HandleOutcome {
        let Some(kind) = DispatchType::from_name(event) else {
            tracing::trace!(event, seq, "Ignoring unhandled dispatch");
            return HandleOutcome::Done;
        };

        if kind == DispatchType::PresencesReplace {
            let presences = data.as_array().map_or(&[][..], Vec::as_slice);
            for presence in presences {
                self.route(DispatchType::PresenceUpdate.as_str(), seq, presence);
            }
            return HandleOutcome::Done;
        }

        if !kind.allowed_while_unavailable() {
            if let Some(guild_id) = guild_id(data) {
                if self.ctx.store.is_unavailable(guild_id) {
                    tracing::warn!(%event, seq, guild_id = %guild_id, "Ignoring event for unavailable guild");
                    return HandleOutcome::Done;
                }
            }
        }

        let Some(handler) = self.handlers.get(&kind) else {
            return HandleOutcome::Done;
        };

        match handler.handle(&self.ctx, seq, data) {
            Ok(HandleOutcome::Deferred { kind: dependency, id }) => {
                self.defer(kind, dependency, id, seq, data.clone());
                HandleOutcome::Deferred { kind: dependency, id }
            }
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(%event, seq, error = %e, payload = %data, "Failed to handle dispatch");
                HandleOutcome::Done
            }
        }
    }

    fn defer(&self, event: DispatchType, kind: CacheKind, id: Snowflake, seq: u64, payload: Value) {
        let router = self.this.clone();
        self.ctx.backfill.cache(
            kind,
            id,
            seq,
            payload,
            Box::new(move |seq, payload| {
                if let Some(router) = router.upgrade() {
                    router.route(event.as_str(), seq, &payload);
                }
            }),
        );
    }
}

fn guild_id(data: &Value) -> Option<Snowflake> {
    data.get("guild_id")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
