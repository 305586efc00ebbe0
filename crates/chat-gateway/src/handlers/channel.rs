//! CHANNEL_CREATE, CHANNEL_UPDATE, CHANNEL_DELETE

use chat_core::Channel;
use serde_json::Value;
use std::sync::Arc;

use super::{parse, HandlerContext, HandlerResult};
use crate::events::{Change, Event, PacketType};

fn changes(old: &Channel, new: &Arc<Channel>) -> Vec<Event> {
    let mut events = Vec::new();
    if let Some(name) = Change::diff(old.name.clone(), new.name.clone()) {
        events.push(Event::ChannelChangeName {
            channel: Arc::clone(new),
            name,
        });
    }
    if let Some(position) = Change::diff(old.position, new.position) {
        events.push(Event::ChannelChangePosition {
            channel: Arc::clone(new),
            position,
        });
    }
    events
}

fn store(ctx: &mut HandlerContext, mut channel: Channel) -> (Option<Arc<Channel>>, Arc<Channel>) {
    let id = channel.id;
    if let Some(cached) = ctx.cache.channel(id) {
        channel.last_message_id = channel.last_message_id.or(cached.last_message_id);
    }
    let fallback = Arc::new(channel.clone());
    let previous = ctx.writer.upsert_channel(channel);
    (previous, ctx.cache.channel(id).unwrap_or(fallback))
}

pub(super) fn create(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let channel: Channel = parse(PacketType::ChannelCreate, payload)?;
    let (previous, channel) = store(ctx, channel);
    Ok(match previous {
        None => vec![Event::ChannelCreate { channel }],
        Some(previous) => changes(&previous, &channel),
    })
}

pub(super) fn update(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let channel: Channel = parse(PacketType::ChannelUpdate, payload)?;
    let (previous, channel) = store(ctx, channel);
    match previous {
        Some(previous) => Ok(changes(&previous, &channel)),
        None => {
            tracing::debug!(channel_id = %channel.id, "Update for unknown channel");
            Ok(Vec::new())
        }
    }
}

pub(super) fn delete(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let channel: Channel = parse(PacketType::ChannelDelete, payload)?;
    Ok(ctx
        .writer
        .remove_channel(channel.id)
        .map(|channel| Event::ChannelDelete { channel })
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{dispatcher, guild};
    use crate::events::{Event, EventType};
    use chat_core::Snowflake;
    use serde_json::json;

    fn general(name: &str, position: i32) -> serde_json::Value {
        json!({"id": "102", "guild_id": "100", "type": 0, "name": name, "position": position})
    }

    #[tokio::test]
    async fn test_rename_and_move() {
        let (mut dispatcher, cache) = dispatcher();
        dispatcher.handle("GUILD_CREATE", Some(guild(100, "home"))).unwrap();

        let events = dispatcher.handle("CHANNEL_UPDATE", Some(general("lobby", 4))).unwrap();
        let types: Vec<_> = events.iter().map(Event::event_type).collect();
        assert_eq!(types, vec![EventType::ChannelChangeName, EventType::ChannelChangePosition]);

        match &events[0] {
            Event::ChannelChangeName { name, .. } => {
                assert_eq!(name.old.as_deref(), Some("general"));
                assert_eq!(name.new.as_deref(), Some("lobby"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(cache.channel(Snowflake::new(102)).unwrap().position, 4);

        assert!(dispatcher.handle("CHANNEL_UPDATE", Some(general("lobby", 4))).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_last_message_id() {
        let (mut dispatcher, cache) = dispatcher();
        let mut created = general("general", 0);
        created["last_message_id"] = json!("555");
        dispatcher.handle("CHANNEL_CREATE", Some(created)).unwrap();

        dispatcher.handle("CHANNEL_UPDATE", Some(general("general", 1))).unwrap();
        let channel = cache.channel(Snowflake::new(102)).unwrap();
        assert_eq!(channel.last_message_id, Some(Snowflake::new(555)));
    }

    #[tokio::test]
    async fn test_create_and_delete_private_channel() {
        let (mut dispatcher, cache) = dispatcher();
        let dm = json!({"id": "900", "type": 1});

        let events = dispatcher.handle("CHANNEL_CREATE", Some(dm.clone())).unwrap();
        assert!(matches!(events.as_slice(), [Event::ChannelCreate { channel }] if channel.is_private()));

        let events = dispatcher.handle("CHANNEL_DELETE", Some(dm.clone())).unwrap();
        assert!(matches!(events.as_slice(), [Event::ChannelDelete { .. }]));
        assert!(cache.channel(Snowflake::new(900)).is_none());
        assert!(dispatcher.handle("CHANNEL_DELETE", Some(dm)).unwrap().is_empty());
    }
}
