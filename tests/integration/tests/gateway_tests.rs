//! Gateway session tests
//!
//! A real client against the in-process mock gateway.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_client::{
    Client, EntityKind, ErrorKind, Event, EventType, FailureCause, Listener, ListenerFailure,
    PresenceUpdatePayload, Scope, SessionState, Snowflake,
};
use chat_gateway::protocol::{GatewayMessage, OpCode};
use integration_tests::*;
use parking_lot::Mutex;
use serde_json::json;

const NO_REST: &str = "http://127.0.0.1:9/api/v10";

async fn connected_client(gateway: &mut MockGateway, sink: &EventSink, types: &[EventType]) -> Result<(Client, GatewayConn)> {
    let client = Client::builder(test_config(&gateway.url(), NO_REST)).build()?;
    for event_type in types {
        sink.listen(&client, *event_type, Scope::Global);
    }
    client.connect()?;

    let mut conn = gateway.accept().await?;
    conn.handshake("session-1", &[100]).await?;
    conn.dispatch("GUILD_CREATE", 2, guild(100, "home")).await?;
    wait_until(|| {
        client
            .cache()
            .server(Snowflake::new(100))
            .is_some_and(|s| !s.unavailable)
    })
    .await?;
    Ok((client, conn))
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_identify_populates_cache() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let client = Client::builder(test_config(&gateway.url(), NO_REST)).build()?;
    let mut sink = EventSink::new();
    sink.listen(&client, EventType::Ready, Scope::Global);
    sink.listen(&client, EventType::ServerJoin, Scope::Global);
    client.connect()?;

    let mut conn = gateway.accept().await?;
    let identify = conn.handshake("session-1", &[100]).await?;
    let payload = identify.as_identify().context("identify payload")?;
    assert_eq!(payload.token, TEST_TOKEN);
    assert_eq!(payload.shard, Some([0, 1]));

    match &*sink.next_of(EventType::Ready).await? {
        Event::Ready { session_id, user, servers } => {
            assert_eq!(session_id, "session-1");
            assert_eq!(user.id, Snowflake::new(BOT_ID));
            assert_eq!(*servers, 1);
        }
        other => panic!("unexpected event {other:?}"),
    }

    conn.dispatch("GUILD_CREATE", 2, guild(100, "home")).await?;
    wait_until(|| client.get_cached_entity(EntityKind::Role, Snowflake::new(101)).is_some()).await?;
    let server = client.cache().server(Snowflake::new(100)).context("server cached")?;
    assert_eq!(server.name, "home");
    assert!(!server.unavailable);
    assert!(client.get_cached_entity(EntityKind::Channel, Snowflake::new(102)).is_some());
    assert_eq!(client.state(), SessionState::Connected);

    // Servers announced in READY arrive silently; later ones are joins
    conn.dispatch("GUILD_CREATE", 3, guild(200, "other")).await?;
    match &*sink.next_of(EventType::ServerJoin).await? {
        Event::ServerJoin { server } => assert_eq!(server.id, Snowflake::new(200)),
        other => panic!("unexpected event {other:?}"),
    }

    client.shutdown().await?;
    assert_eq!(conn.expect_close().await?, Some(1000));
    assert_eq!(client.state(), SessionState::Disconnected);
    Ok(())
}

#[tokio::test]
async fn test_authentication_failure_is_fatal() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let client = Client::builder(test_config(&gateway.url(), NO_REST)).build()?;
    client.connect()?;

    let mut conn = gateway.accept().await?;
    conn.hello(45_000).await?;
    conn.recv_op(OpCode::Identify).await?;
    conn.close(4004, "Authentication failed.").await?;

    let err = tokio::time::timeout(TIMEOUT, client.wait())
        .await
        .context("session did not stop")?
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    assert_eq!(client.state(), SessionState::Disconnected);
    Ok(())
}

// ============================================================================
// Reconnects
// ============================================================================

#[tokio::test]
async fn test_resumable_close_sends_resume() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let mut sink = EventSink::new();
    let (client, mut conn) = connected_client(
        &mut gateway,
        &sink,
        &[EventType::LostConnection, EventType::Resumed, EventType::Reconnect],
    )
    .await?;

    conn.close(4000, "Unknown error").await?;

    let mut conn = gateway.accept().await?;
    assert_eq!(client.state(), SessionState::Resuming);
    conn.hello(45_000).await?;
    let resume = conn.recv_op(OpCode::Resume).await?;
    let payload = resume.as_resume().context("resume payload")?;
    assert_eq!(payload.token, TEST_TOKEN);
    assert_eq!(payload.session_id, "session-1");
    assert_eq!(payload.seq, 2);

    conn.dispatch("RESUMED", 3, json!({})).await?;
    assert_eq!(sink.next().await?.event_type(), EventType::LostConnection);
    assert_eq!(sink.next().await?.event_type(), EventType::Resumed);
    assert_eq!(client.state(), SessionState::Connected);

    // Cache survives a resume
    assert!(client.cache().server(Snowflake::new(100)).is_some());

    client.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_reconnect_request_resumes() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let sink = EventSink::new();
    let (client, mut conn) = connected_client(&mut gateway, &sink, &[]).await?;

    conn.send(&GatewayMessage::reconnect()).await?;
    assert_eq!(conn.expect_close().await?, Some(4000));

    let mut conn = gateway.accept().await?;
    conn.hello(45_000).await?;
    let resume = conn.recv_op(OpCode::Resume).await?;
    assert_eq!(resume.as_resume().context("resume payload")?.session_id, "session-1");

    client.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_missing_heartbeat_ack_reconnects() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let client = Client::builder(test_config(&gateway.url(), NO_REST)).build()?;
    client.connect()?;

    let mut conn = gateway.accept().await?;
    conn.hello(200).await?;
    conn.recv_op(OpCode::Identify).await?;
    conn.dispatch("READY", 1, ready("session-1", &[])).await?;

    // One beat, never acknowledged
    conn.recv_op(OpCode::Heartbeat).await?;
    assert_eq!(conn.expect_close().await?, Some(4000));

    let mut conn = gateway.accept().await?;
    conn.hello(45_000).await?;
    let resume = conn.recv_op(OpCode::Resume).await?;
    let payload = resume.as_resume().context("resume payload")?;
    assert_eq!(payload.session_id, "session-1");
    assert_eq!(payload.seq, 1);

    client.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_acknowledged_heartbeats_keep_session() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let client = Client::builder(test_config(&gateway.url(), NO_REST)).build()?;
    client.connect()?;

    let mut conn = gateway.accept().await?;
    conn.hello(100).await?;
    conn.recv_op(OpCode::Identify).await?;
    conn.dispatch("READY", 1, ready("session-1", &[])).await?;

    for _ in 0..4 {
        conn.recv_op(OpCode::Heartbeat).await?;
        conn.send(&GatewayMessage::heartbeat_ack()).await?;
    }
    assert_eq!(client.state(), SessionState::Connected);
    assert!(client.latency().is_some());

    client.shutdown().await?;
    assert_eq!(conn.expect_close().await?, Some(1000));
    Ok(())
}

#[tokio::test]
async fn test_server_heartbeat_request_is_answered() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let sink = EventSink::new();
    let (client, mut conn) = connected_client(&mut gateway, &sink, &[]).await?;

    conn.send(&GatewayMessage::heartbeat(None)).await?;
    let beat = conn.recv_op(OpCode::Heartbeat).await?;
    assert_eq!(beat.as_heartbeat_seq(), Some(Some(2)));

    client.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_session_identifies_again() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let mut sink = EventSink::new();
    let (client, mut conn) = connected_client(&mut gateway, &sink, &[EventType::Reconnect]).await?;

    conn.send(&GatewayMessage::invalid_session(false)).await?;
    conn.expect_close().await?;

    let mut conn = gateway.accept().await?;
    conn.hello(45_000).await?;
    conn.recv_op(OpCode::Identify).await?;
    conn.dispatch("READY", 1, ready("session-2", &[100])).await?;

    assert_eq!(sink.next_of(EventType::Reconnect).await?.event_type(), EventType::Reconnect);
    assert_eq!(client.state(), SessionState::Connected);

    client.shutdown().await?;
    Ok(())
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_role_color_change_emits_one_event() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let mut sink = EventSink::new();
    let (client, mut conn) = connected_client(&mut gateway, &sink, &[EventType::RoleChangeName]).await?;
    sink.listen(&client, EventType::RoleChangeColor, Scope::Server(Snowflake::new(100)));
    sink.listen(&client, EventType::RoleChangeHoist, Scope::Object(Snowflake::new(101)));

    conn.dispatch("GUILD_ROLE_UPDATE", 3, role_update(100, &json!({"color": 65280})))
        .await?;

    let events = sink.drain_for(Duration::from_millis(300)).await;
    assert_eq!(events.len(), 1, "got {events:?}");
    match &*events[0] {
        Event::RoleChangeColor { role, color } => {
            assert_eq!(role.id, Snowflake::new(101));
            assert_eq!((color.old, color.new), (255, 65280));
        }
        other => panic!("unexpected event {other:?}"),
    }
    let role = client.cache().role(Snowflake::new(101)).context("role cached")?;
    assert_eq!(role.color, 65280);

    client.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_replayed_dispatch_is_dropped() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let mut sink = EventSink::new();
    let (client, mut conn) = connected_client(&mut gateway, &sink, &[EventType::MessageCreate]).await?;

    let author = user(7, "alice");
    conn.dispatch("MESSAGE_CREATE", 3, message(1000, 100, &author, "first")).await?;
    conn.dispatch("MESSAGE_CREATE", 3, message(1000, 100, &author, "first")).await?;
    conn.dispatch("MESSAGE_CREATE", 4, message(1001, 100, &author, "second")).await?;

    let contents: Vec<String> = sink
        .drain_for(Duration::from_millis(300))
        .await
        .iter()
        .filter_map(|event| match &**event {
            Event::MessageCreate { message } => Some(message.content.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(contents, vec!["first", "second"]);

    let channel = client.cache().channel(Snowflake::new(102)).context("channel cached")?;
    assert_eq!(channel.last_message_id, Some(Snowflake::new(1001)));

    client.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_failing_listener_does_not_stop_delivery() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let failures: Arc<Mutex<Vec<ListenerFailure>>> = Arc::default();
    let hook_failures = Arc::clone(&failures);
    let client = Client::builder(test_config(&gateway.url(), NO_REST))
        .error_hook(Arc::new(move |failure: ListenerFailure| hook_failures.lock().push(failure)))
        .build()?;

    let mut sink = EventSink::new();
    client.register_listener(
        EventType::MessageCreate,
        Scope::Global,
        Listener::sync(|_| panic!("listener bug")),
    );
    client.register_listener(
        EventType::MessageCreate,
        Scope::Global,
        Listener::sync(|_| Err(anyhow::anyhow!("listener error"))),
    );
    sink.listen(&client, EventType::MessageCreate, Scope::Global);
    client.connect()?;

    let mut conn = gateway.accept().await?;
    conn.handshake("session-1", &[100]).await?;
    conn.dispatch("GUILD_CREATE", 2, guild(100, "home")).await?;
    conn.dispatch("MESSAGE_CREATE", 3, message(1000, 100, &user(7, "alice"), "hi")).await?;

    assert_eq!(sink.next().await?.event_type(), EventType::MessageCreate);
    wait_until(|| failures.lock().len() == 2).await?;
    let failures = failures.lock();
    assert!(matches!(failures[0].cause, FailureCause::Panic(ref msg) if msg == "listener bug"));
    assert!(matches!(failures[1].cause, FailureCause::Error(_)));
    drop(failures);

    client.shutdown().await?;
    Ok(())
}

// ============================================================================
// Presence
// ============================================================================

#[tokio::test]
async fn test_presence_sent_live_and_with_next_identify() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let sink = EventSink::new();
    let (client, mut conn) = connected_client(&mut gateway, &sink, &[]).await?;

    client.update_presence(PresenceUpdatePayload::status("dnd")).await?;
    let update = conn.recv_op(OpCode::PresenceUpdate).await?;
    assert_eq!(update.as_presence_update().context("presence payload")?.status, "dnd");

    let err = client
        .update_presence(PresenceUpdatePayload::status("busy"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedPacket);

    // A fresh identify carries the presence along
    conn.send(&GatewayMessage::invalid_session(false)).await?;
    conn.expect_close().await?;
    let mut conn = gateway.accept().await?;
    conn.hello(45_000).await?;
    let identify = conn.recv_op(OpCode::Identify).await?;
    let presence = identify
        .as_identify()
        .and_then(|payload| payload.presence)
        .context("identify presence")?;
    assert_eq!(presence.status, "dnd");

    client.shutdown().await?;
    Ok(())
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_while_waiting_closes_session() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let sink = EventSink::new();
    let (client, mut conn) = connected_client(&mut gateway, &sink, &[]).await?;

    // A wait that gets dropped must not detach the session
    tokio::select! {
        result = client.wait() => panic!("session ended early: {result:?}"),
        () = tokio::time::sleep(Duration::from_millis(100)) => {}
    }
    assert_eq!(client.state(), SessionState::Connected);

    let (waited, shut) = tokio::join!(client.wait(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.shutdown().await
    });
    waited?;
    shut?;

    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(conn.expect_close().await?, Some(1000));
    client.wait().await?;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_before_hello_is_prompt() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let client = Client::builder(test_config(&gateway.url(), NO_REST)).build()?;
    client.connect()?;

    // Never send Hello
    let mut conn = gateway.accept().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = tokio::time::Instant::now();
    client.shutdown().await?;
    assert!(started.elapsed() < Duration::from_secs(1), "shutdown waited for the Hello timeout");
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(conn.expect_close().await?, Some(1000));
    Ok(())
}
