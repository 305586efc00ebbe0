//! USER_UPDATE

use chat_core::User;
use serde_json::Value;
use std::sync::Arc;

use super::{parse, HandlerContext, HandlerResult};
use crate::events::{Change, Event, PacketType};

/// Changes to the connected user's own profile
pub(super) fn update(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let user: User = parse(PacketType::UserUpdate, payload)?;
    let id = user.id;
    let previous = ctx.cache.user(id);

    let fallback = Arc::new(user.clone());
    let is_current = ctx.cache.current_user().is_none_or(|current| current.id == id);
    if is_current {
        ctx.writer.set_current_user(user);
    } else {
        ctx.writer.upsert_user(user);
    }
    let user = ctx.cache.user(id).unwrap_or(fallback);

    let Some(previous) = previous else {
        return Ok(Vec::new());
    };

    let mut events = Vec::new();
    if let Some(name) = Change::diff(previous.username.clone(), user.username.clone()) {
        events.push(Event::UserChangeName {
            user: Arc::clone(&user),
            name,
        });
    }
    if let Some(avatar) = Change::diff(previous.avatar.clone(), user.avatar.clone()) {
        events.push(Event::UserChangeAvatar { user, avatar });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::dispatcher;
    use crate::events::{Event, EventType, Scope};
    use chat_core::Snowflake;
    use serde_json::json;

    #[tokio::test]
    async fn test_name_and_avatar_change() {
        let (mut dispatcher, cache) = dispatcher();
        dispatcher
            .handle("USER_UPDATE", Some(json!({"id": "7", "username": "bot"})))
            .unwrap();

        let events = dispatcher
            .handle("USER_UPDATE", Some(json!({"id": "7", "username": "robot", "avatar": "abc"})))
            .unwrap();
        let types: Vec<_> = events.iter().map(Event::event_type).collect();
        assert_eq!(types, vec![EventType::UserChangeName, EventType::UserChangeAvatar]);
        assert_eq!(events[0].scopes(), vec![Scope::User(Snowflake::new(7))]);

        assert_eq!(cache.current_user().unwrap().username, "robot");
        assert!(dispatcher
            .handle("USER_UPDATE", Some(json!({"id": "7", "username": "robot", "avatar": "abc"})))
            .unwrap()
            .is_empty());
    }
}
