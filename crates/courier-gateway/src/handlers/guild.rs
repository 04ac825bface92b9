//! GUILD_CREATE and GUILD_DELETE

use super::{DispatchContext, DispatchHandler, HandleOutcome, HandlerError, HandlerResult};
use crate::events::GatewayEvent;
use crate::protocol::UnavailableGuild;
use courier_cache::CacheKind;
use courier_core::{Channel, Guild, Snowflake};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct GuildCreate {
    #[serde(flatten)]
    guild: Guild,
    #[serde(default)]
    channels: Vec<Channel>,
}

pub struct GuildCreateHandler;

impl DispatchHandler for GuildCreateHandler {
    fn handle(&self, ctx: &DispatchContext, _seq: u64, data: &Value) -> HandlerResult<HandleOutcome> {
        let GuildCreate { guild, channels } =
            GuildCreate::deserialize(data).map_err(HandlerError::invalid("GUILD_CREATE"))?;
        let guild_id = guild.id;

        if guild.unavailable {
            ctx.store.mark_unavailable(guild_id);
            ctx.emit(GatewayEvent::GuildUnavailable(guild_id));
            tracing::warn!(guild_id = %guild_id, "Guild created as unavailable");
            return Ok(settled(ctx, guild_id));
        }

        let channel_ids: Vec<_> = channels.iter().map(|c| c.id).collect();
        for mut channel in channels {
            channel.guild_id = Some(guild_id);
            ctx.store.channels.upsert(channel);
        }
        ctx.store.guilds.upsert(guild.clone());
        if ctx.store.mark_available(guild_id) {
            tracing::info!(guild_id = %guild_id, "Guild available again");
        }
        ctx.emit(GatewayEvent::GuildAvailable(guild));

        let mut replayed = ctx.backfill.play_back(CacheKind::Guild, guild_id);
        for channel_id in channel_ids {
            replayed += ctx.backfill.play_back(CacheKind::Channel, channel_id);
        }
        if replayed > 0 {
            tracing::debug!(guild_id = %guild_id, replayed, "Replayed events parked on guild");
        }

        Ok(settled(ctx, guild_id))
    }
}

fn settled(ctx: &DispatchContext, guild_id: Snowflake) -> HandleOutcome {
    if ctx.settle_guild(guild_id) {
        HandleOutcome::InitialLoadComplete
    } else {
        HandleOutcome::Done
    }
}

pub struct GuildDeleteHandler;

impl DispatchHandler for GuildDeleteHandler {
    fn handle(&self, ctx: &DispatchContext, _seq: u64, data: &Value) -> HandlerResult<HandleOutcome> {
        let deleted =
            UnavailableGuild::deserialize(data).map_err(HandlerError::invalid("GUILD_DELETE"))?;

        if deleted.unavailable {
            ctx.store.mark_unavailable(deleted.id);
            ctx.emit(GatewayEvent::GuildUnavailable(deleted.id));
            tracing::warn!(guild_id = %deleted.id, "Guild became unavailable");
            return Ok(settled(ctx, deleted.id));
        }

        ctx.store.guilds.remove(deleted.id);
        let orphaned: Vec<_> = ctx
            .store
            .channels
            .snapshot()
            .iter()
            .filter(|c| c.guild_id == Some(deleted.id))
            .map(|c| c.id)
            .collect();
        for channel_id in &orphaned {
            ctx.store.channels.remove(*channel_id);
        }

        tracing::info!(guild_id = %deleted.id, channels = orphaned.len(), "Left guild");
        ctx.emit(GatewayEvent::GuildRemoved(deleted.id));
        Ok(settled(ctx, deleted.id))
    }
}
