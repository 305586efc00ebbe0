//! MESSAGE_CREATE, MESSAGE_UPDATE, MESSAGE_DELETE

use chat_core::{Message, Snowflake};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{parse, HandlerContext, HandlerResult};
use crate::events::{Event, PacketType};

/// MESSAGE_UPDATE only carries the fields that changed
#[derive(Debug, Deserialize)]
struct MessageUpdatePayload {
    id: Snowflake,
    channel_id: Snowflake,
    #[serde(default)]
    guild_id: Option<Snowflake>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pinned: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct MessageDeletePayload {
    id: Snowflake,
    channel_id: Snowflake,
    #[serde(default)]
    guild_id: Option<Snowflake>,
}

pub(super) fn create(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let message: Message = parse(PacketType::MessageCreate, payload)?;
    let id = message.id;

    ctx.writer.upsert_user(message.author.clone());
    if let Some(channel) = ctx.cache.channel(message.channel_id) {
        if channel.last_message_id.is_none_or(|last| last < id) {
            let mut channel = (*channel).clone();
            channel.last_message_id = Some(id);
            ctx.writer.upsert_channel(channel);
        }
    }

    let fallback = Arc::new(message.clone());
    if ctx.writer.upsert_message(message).is_some() {
        tracing::trace!(message_id = %id, "Message already cached");
        return Ok(Vec::new());
    }
    let message = ctx.cache.message(id).unwrap_or(fallback);
    Ok(vec![Event::MessageCreate { message }])
}

pub(super) fn update(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let update: MessageUpdatePayload = parse(PacketType::MessageUpdate, payload)?;

    let Some(cached) = ctx.cache.message(update.id) else {
        // Unknown message: only a content change is worth reporting
        return Ok(update
            .content
            .map(|new_content| Event::MessageEdit {
                message_id: update.id,
                channel_id: update.channel_id,
                server_id: update.guild_id,
                message: None,
                old_content: None,
                new_content,
            })
            .into_iter()
            .collect());
    };

    let mut message = (*cached).clone();
    if let Some(content) = &update.content {
        message.content.clone_from(content);
    }
    if update.edited_timestamp.is_some() {
        message.edited_timestamp = update.edited_timestamp;
    }
    if let Some(pinned) = update.pinned {
        message.pinned = pinned;
    }

    let fallback = Arc::new(message.clone());
    ctx.writer.upsert_message(message);
    let message = ctx.cache.message(update.id).unwrap_or(fallback);

    match update.content {
        Some(new_content) if new_content != cached.content => Ok(vec![Event::MessageEdit {
            message_id: update.id,
            channel_id: update.channel_id,
            server_id: update.guild_id.or(cached.server_id),
            message: Some(message),
            old_content: Some(cached.content.clone()),
            new_content,
        }]),
        _ => Ok(Vec::new()),
    }
}

/// Reported even when nothing was cached, since the cache only keeps a
/// window of recent messages per channel
pub(super) fn delete(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let MessageDeletePayload {
        id,
        channel_id,
        guild_id,
    } = parse(PacketType::MessageDelete, payload)?;

    let message = ctx.writer.remove_message(id);
    Ok(vec![Event::MessageDelete {
        message_id: id,
        channel_id,
        server_id: guild_id.or_else(|| message.as_ref().and_then(|m| m.server_id)),
        message,
    }])
}
