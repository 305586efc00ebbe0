//! GUILD_CREATE, GUILD_UPDATE, GUILD_DELETE

use chat_core::{Channel, Role, Server, Snowflake};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::{parse, HandlerContext, HandlerResult};
use crate::events::{Change, Event, PacketType};

/// Full server payload as sent by GUILD_CREATE
#[derive(Debug, Deserialize)]
struct ServerPayload {
    #[serde(flatten)]
    server: Server,
    #[serde(default)]
    roles: Vec<Role>,
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct ServerDeletePayload {
    id: Snowflake,
    #[serde(default)]
    unavailable: bool,
}

/// Replace the server, its roles, and its channels wholesale
pub(super) fn create(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let ServerPayload {
        server,
        roles,
        channels,
    } = parse(PacketType::GuildCreate, payload)?;
    let server_id = server.id;

    let previous = ctx.writer.upsert_server(server);

    let role_ids: HashSet<_> = roles.iter().map(|r| r.id).collect();
    for stale in ctx.cache.roles_in(server_id).into_iter().filter(|r| !role_ids.contains(&r.id)) {
        ctx.writer.remove_role(stale.id);
    }
    for mut role in roles {
        role.server_id = server_id;
        ctx.writer.upsert_role(role);
    }

    let channel_ids: HashSet<_> = channels.iter().map(|c| c.id).collect();
    for stale in ctx
        .cache
        .channels_in(server_id)
        .into_iter()
        .filter(|c| !channel_ids.contains(&c.id))
    {
        ctx.writer.remove_channel(stale.id);
    }
    for mut channel in channels {
        channel.server_id = Some(server_id);
        ctx.writer.upsert_channel(channel);
    }

    let Some(server) = ctx.cache.server(server_id) else {
        return Ok(Vec::new());
    };

    if ctx.pending_servers.remove(&server_id) {
        tracing::trace!(server_id = %server_id, "Initial server load");
        return Ok(Vec::new());
    }

    let event = match previous {
        None => Some(Event::ServerJoin { server }),
        Some(previous) if previous.unavailable && !server.unavailable => {
            Some(Event::ServerBecomesAvailable { server })
        }
        Some(_) => None,
    };
    Ok(event.into_iter().collect())
}

pub(super) fn update(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let mut server: Server = parse(PacketType::GuildUpdate, payload)?;

    let Some(previous) = ctx.cache.server(server.id) else {
        tracing::debug!(server_id = %server.id, "Update for unknown server");
        ctx.writer.upsert_server(server);
        return Ok(Vec::new());
    };

    // Only sent with GUILD_CREATE
    server.large = previous.large;
    server.member_count = server.member_count.or(previous.member_count);

    let name = Change::diff(previous.name.clone(), server.name.clone());
    let server_id = server.id;
    ctx.writer.upsert_server(server);
    let server = ctx.cache.server(server_id).unwrap_or_else(|| Arc::clone(&previous));

    Ok(name
        .map(|name| Event::ServerChangeName { server, name })
        .into_iter()
        .collect())
}

/// Server left, or gone dark during an outage when `unavailable` is set
pub(super) fn delete(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let ServerDeletePayload { id, unavailable } = parse(PacketType::GuildDelete, payload)?;
    ctx.pending_servers.remove(&id);

    let removed = ctx.writer.remove_server(id);

    if unavailable {
        ctx.writer.upsert_server(Server::unavailable(id));
        let was_available = removed.is_some_and(|s| !s.unavailable);
        return Ok(if was_available {
            vec![Event::ServerBecomesUnavailable { server_id: id }]
        } else {
            Vec::new()
        });
    }

    Ok(removed
        .map(|server| Event::ServerLeave { server })
        .into_iter()
        .collect())
}
