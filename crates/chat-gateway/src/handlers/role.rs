//! GUILD_ROLE_CREATE, GUILD_ROLE_UPDATE, GUILD_ROLE_DELETE

use chat_core::{Role, Snowflake};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{parse, HandlerContext, HandlerResult};
use crate::events::{Change, Event, PacketType};

#[derive(Debug, Deserialize)]
struct RolePayload {
    guild_id: Snowflake,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct RoleDeletePayload {
    role_id: Snowflake,
}

/// One event per changed field, in a fixed order
fn changes(old: &Role, new: &Arc<Role>) -> Vec<Event> {
    let mut events = Vec::new();
    if let Some(color) = Change::diff(old.color, new.color) {
        events.push(Event::RoleChangeColor {
            role: Arc::clone(new),
            color,
        });
    }
    if let Some(hoist) = Change::diff(old.hoist, new.hoist) {
        events.push(Event::RoleChangeHoist {
            role: Arc::clone(new),
            hoist,
        });
    }
    if let Some(mentionable) = Change::diff(old.mentionable, new.mentionable) {
        events.push(Event::RoleChangeMentionable {
            role: Arc::clone(new),
            mentionable,
        });
    }
    if let Some(name) = Change::diff(old.name.clone(), new.name.clone()) {
        events.push(Event::RoleChangeName {
            role: Arc::clone(new),
            name,
        });
    }
    if let Some(permissions) = Change::diff(old.permissions, new.permissions) {
        events.push(Event::RoleChangePermissions {
            role: Arc::clone(new),
            permissions,
        });
    }
    if let Some(position) = Change::diff(old.position, new.position) {
        events.push(Event::RoleChangePosition {
            role: Arc::clone(new),
            position,
        });
    }
    events
}

fn apply(
    ctx: &mut HandlerContext,
    packet: PacketType,
    payload: Value,
) -> HandlerResult<(Option<Arc<Role>>, Arc<Role>)> {
    let RolePayload { guild_id, mut role } = parse(packet, payload)?;
    role.server_id = guild_id;

    let id = role.id;
    let fallback = Arc::new(role.clone());
    let previous = ctx.writer.upsert_role(role);
    let current = ctx.cache.role(id).unwrap_or(fallback);
    Ok((previous, current))
}

pub(super) fn create(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let (previous, role) = apply(ctx, PacketType::GuildRoleCreate, payload)?;
    Ok(match previous {
        None => vec![Event::RoleCreate { role }],
        Some(previous) => changes(&previous, &role),
    })
}

pub(super) fn update(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let (previous, role) = apply(ctx, PacketType::GuildRoleUpdate, payload)?;
    match previous {
        Some(previous) => Ok(changes(&previous, &role)),
        None => {
            tracing::debug!(role_id = %role.id, server_id = %role.server_id, "Update for unknown role");
            Ok(Vec::new())
        }
    }
}

pub(super) fn delete(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let RoleDeletePayload { role_id } = parse(PacketType::GuildRoleDelete, payload)?;
    Ok(ctx
        .writer
        .remove_role(role_id)
        .map(|role| Event::RoleDelete { role })
        .into_iter()
        .collect())
}
