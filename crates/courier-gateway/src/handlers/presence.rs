//! PRESENCE_UPDATE

use super::{DispatchContext, DispatchHandler, HandleOutcome, HandlerError, HandlerResult};
use crate::events::GatewayEvent;
use courier_core::Snowflake;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct PresenceUser {
    id: Snowflake,
}

#[derive(Debug, Deserialize)]
struct Presence {
    user: PresenceUser,
    #[serde(default)]
    status: Option<String>,
}

pub struct PresenceHandler;

impl DispatchHandler for PresenceHandler {
    fn handle(&self, ctx: &DispatchContext, _seq: u64, data: &Value) -> HandlerResult<HandleOutcome> {
        let presence = Presence::deserialize(data).map_err(HandlerError::invalid("PRESENCE_UPDATE"))?;
        let status = presence.status.ok_or(HandlerError::MissingField("status"))?;

        tracing::trace!(user_id = %presence.user.id, %status, "Presence updated");
        ctx.emit(GatewayEvent::PresenceUpdated {
            user_id: presence.user.id,
            status,
        });
        Ok(HandleOutcome::Done)
    }
}
