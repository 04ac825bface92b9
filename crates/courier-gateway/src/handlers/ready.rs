//! READY

use super::{DispatchContext, DispatchHandler, HandleOutcome, HandlerError, HandlerResult};
use crate::protocol::ReadyPayload;
use serde::Deserialize;
use serde_json::Value;

pub struct ReadyHandler;

impl DispatchHandler for ReadyHandler {
    fn handle(&self, ctx: &DispatchContext, _seq: u64, data: &Value) -> HandlerResult<HandleOutcome> {
        let ready = ReadyPayload::deserialize(data).map_err(HandlerError::invalid("READY"))?;

        ctx.store.set_self_user(ready.user);
        let guilds = ready.guilds.len();
        let done = ctx.begin_initial_load(ready.guilds.into_iter().map(|g| g.id));

        tracing::debug!(guilds, "Initial load started");
        Ok(if done {
            HandleOutcome::InitialLoadComplete
        } else {
            HandleOutcome::Done
        })
    }
}
