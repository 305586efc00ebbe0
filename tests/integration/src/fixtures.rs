//! Gateway payload builders
//!
//! Ids follow one layout: a server `id` owns role `id` (@everyone), role
//! `id + 1` ("mods") and text channel `id + 2` ("general").

use serde_json::{json, Value};

pub const BOT_ID: u64 = 42;

pub fn bot_user() -> Value {
    json!({
        "id": BOT_ID.to_string(),
        "username": "tester",
        "discriminator": "0001",
        "avatar": null,
        "bot": true
    })
}

pub fn user(id: u64, username: &str) -> Value {
    json!({"id": id.to_string(), "username": username, "discriminator": "0"})
}

pub fn ready(session_id: &str, servers: &[u64]) -> Value {
    let guilds: Vec<Value> = servers
        .iter()
        .map(|id| json!({"id": id.to_string(), "unavailable": true}))
        .collect();
    json!({
        "v": 10,
        "session_id": session_id,
        "resume_gateway_url": null,
        "user": bot_user(),
        "guilds": guilds,
        "shard": [0, 1]
    })
}

pub fn mods_role(server_id: u64) -> Value {
    json!({
        "id": (server_id + 1).to_string(),
        "name": "mods",
        "color": 255,
        "hoist": false,
        "position": 1,
        "permissions": "8",
        "managed": false,
        "mentionable": false
    })
}

pub fn guild(id: u64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "owner_id": BOT_ID.to_string(),
        "member_count": 2,
        "roles": [
            {"id": id.to_string(), "name": "@everyone", "permissions": "0", "position": 0},
            mods_role(id)
        ],
        "channels": [
            {"id": (id + 2).to_string(), "type": 0, "name": "general", "position": 0}
        ]
    })
}

/// GUILD_ROLE_UPDATE for the "mods" role with `overrides` applied
pub fn role_update(server_id: u64, overrides: &Value) -> Value {
    let mut role = mods_role(server_id);
    if let (Some(role), Some(overrides)) = (role.as_object_mut(), overrides.as_object()) {
        for (key, value) in overrides {
            role.insert(key.clone(), value.clone());
        }
    }
    json!({"guild_id": server_id.to_string(), "role": role})
}

pub fn message(id: u64, server_id: u64, author: &Value, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": (server_id + 2).to_string(),
        "guild_id": server_id.to_string(),
        "author": author,
        "content": content,
        "timestamp": "2024-05-01T12:00:00.000000+00:00",
        "edited_timestamp": null,
        "tts": false,
        "pinned": false,
        "attachments": []
    })
}

/// Discord style error body
pub fn error_body(code: u32, message: &str) -> Value {
    json!({"code": code, "message": message})
}
