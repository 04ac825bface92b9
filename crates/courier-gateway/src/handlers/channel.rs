//! CHANNEL_CREATE

use super::{DispatchContext, DispatchHandler, HandleOutcome, HandlerError, HandlerResult};
use crate::events::GatewayEvent;
use courier_cache::CacheKind;
use courier_core::Channel;
use serde::Deserialize;
use serde_json::Value;

pub struct ChannelCreateHandler;

impl DispatchHandler for ChannelCreateHandler {
    fn handle(&self, ctx: &DispatchContext, _seq: u64, data: &Value) -> HandlerResult<HandleOutcome> {
        let channel = Channel::deserialize(data).map_err(HandlerError::invalid("CHANNEL_CREATE"))?;
        let channel_id = channel.id;

        ctx.store.channels.upsert(channel.clone());
        ctx.emit(GatewayEvent::ChannelCreated(channel));
        ctx.backfill.play_back(CacheKind::Channel, channel_id);
        Ok(HandleOutcome::Done)
    }
}
