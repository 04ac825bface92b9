//! MESSAGE_CREATE

use super::{DispatchContext, DispatchHandler, HandleOutcome, HandlerError, HandlerResult};
use crate::events::GatewayEvent;
use courier_cache::CacheKind;
use courier_core::Message;
use serde::Deserialize;
use serde_json::Value;

pub struct MessageCreateHandler;

impl DispatchHandler for MessageCreateHandler {
    fn handle(&self, ctx: &DispatchContext, seq: u64, data: &Value) -> HandlerResult<HandleOutcome> {
        let message = Message::deserialize(data).map_err(HandlerError::invalid("MESSAGE_CREATE"))?;

        if !ctx.store.channels.contains(message.channel_id) {
            tracing::debug!(
                channel_id = %message.channel_id,
                seq,
                "Message for unknown channel, deferring"
            );
            return Ok(HandleOutcome::Deferred {
                kind: CacheKind::Channel,
                id: message.channel_id,
            });
        }

        // Authors we never saw in a member list are kept as placeholders
        if ctx.store.user(message.author.id).is_none() {
            ctx.store.fake_users.upsert(message.author.clone());
        }

        ctx.emit(GatewayEvent::MessageReceived(message));
        Ok(HandleOutcome::Done)
    }
}
