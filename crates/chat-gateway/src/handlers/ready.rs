//! READY and RESUMED

use chat_core::Server;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::{parse, HandlerContext, HandlerResult};
use crate::events::{Event, PacketType};
use crate::protocol::ReadyPayload;

/// Record the current user and announce the servers to expect
///
/// Servers already cached (from an earlier session) keep their snapshot so
/// the GUILD_CREATE that follows diffs against it. Cached servers missing
/// from the list were left while disconnected and are dropped.
pub(super) fn ready(ctx: &mut HandlerContext, payload: Value) -> HandlerResult<Vec<Event>> {
    let ready: ReadyPayload = parse(PacketType::Ready, payload)?;

    ctx.writer.set_current_user(ready.user.clone());

    let listed: HashSet<_> = ready.guilds.iter().map(|g| g.id).collect();
    for stale in ctx.cache.servers().into_iter().filter(|s| !listed.contains(&s.id)) {
        tracing::debug!(server_id = %stale.id, "Server missing from READY, dropping");
        ctx.writer.remove_server(stale.id);
    }

    for guild in &ready.guilds {
        if ctx.cache.server(guild.id).is_none() {
            ctx.writer.upsert_server(Server::unavailable(guild.id));
        }
        ctx.pending_servers.insert(guild.id);
    }

    tracing::info!(
        session_id = %ready.session_id,
        user = %ready.user.tag(),
        servers = ready.guilds.len(),
        "Session ready"
    );

    let user = ctx
        .cache
        .current_user()
        .unwrap_or_else(|| Arc::new(ready.user));
    Ok(vec![Event::Ready {
        session_id: ready.session_id,
        user,
        servers: ready.guilds.len(),
    }])
}

pub(super) fn resumed(_ctx: &mut HandlerContext, _payload: Value) -> HandlerResult<Vec<Event>> {
    Ok(vec![Event::Resumed])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{dispatcher, guild};
    use crate::events::Event;
    use chat_core::Snowflake;
    use serde_json::json;

    fn ready_payload(guilds: &[u64]) -> serde_json::Value {
        json!({
            "v": 10,
            "session_id": "abc",
            "resume_gateway_url": "wss://resume.example",
            "user": {"id": "7", "username": "bot", "bot": true},
            "guilds": guilds.iter().map(|id| json!({"id": id.to_string(), "unavailable": true})).collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_ready_caches_user_and_placeholders() {
        let (mut dispatcher, cache) = dispatcher();
        let events = dispatcher.handle("READY", Some(ready_payload(&[10, 20]))).unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Ready { session_id, user, servers } => {
                assert_eq!(session_id, "abc");
                assert_eq!(user.username, "bot");
                assert_eq!(*servers, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert_eq!(cache.current_user().unwrap().id, Snowflake::new(7));
        assert!(cache.server(Snowflake::new(10)).unwrap().unavailable);
        assert!(cache.server(Snowflake::new(20)).unwrap().unavailable);
    }

    #[tokio::test]
    async fn test_initial_guild_create_is_silent() {
        let (mut dispatcher, cache) = dispatcher();
        dispatcher.handle("READY", Some(ready_payload(&[100]))).unwrap();

        let events = dispatcher.handle("GUILD_CREATE", Some(guild(100, "home"))).unwrap();
        assert!(events.is_empty());
        assert_eq!(cache.server(Snowflake::new(100)).unwrap().name, "home");
    }

    #[tokio::test]
    async fn test_re_identify_keeps_known_servers_and_drops_stale() {
        let (mut dispatcher, cache) = dispatcher();
        dispatcher.handle("GUILD_CREATE", Some(guild(100, "kept"))).unwrap();
        dispatcher.handle("GUILD_CREATE", Some(guild(200, "left"))).unwrap();

        dispatcher.reset_session();
        dispatcher.handle("READY", Some(ready_payload(&[100]))).unwrap();

        assert_eq!(cache.server(Snowflake::new(100)).unwrap().name, "kept");
        assert!(cache.server(Snowflake::new(200)).is_none());
        assert!(cache.channel(Snowflake::new(202)).is_none());
    }

    #[tokio::test]
    async fn test_resumed() {
        let (mut dispatcher, _) = dispatcher();
        let events = dispatcher.handle("RESUMED", Some(json!({}))).unwrap();
        assert!(matches!(events.as_slice(), [Event::Resumed]));
    }
}
