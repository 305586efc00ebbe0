//! Gateway session
//!
//! Owns the socket lifecycle for one client: connect, Hello, identify or
//! resume, the read loop, and reconnecting with backoff after the socket
//! drops. Dispatch packets are handed to the [`PacketDispatcher`] in arrival
//! order from this single task.

use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;

use chat_common::ClientConfig;

use super::backoff::{invalid_session_delay, Backoff};
use super::heartbeat::run_heartbeat;
use super::socket::{self, close_error, Outbound, WsReader};
use super::state::{SessionShared, SessionState};
use super::throttle::IdentifyThrottle;
use crate::error::GatewayError;
use crate::events::Event;
use crate::handlers::PacketDispatcher;
use crate::protocol::{
    classify, decode, decode_bytes, CloseAction, GatewayMessage, IdentifyPayload, IdentifyProperties,
    OpCode, PresenceUpdatePayload, ReadyPayload, ResumePayload,
};

const OUTBOUND_BUFFER: usize = 64;
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Close code sent when we intend to resume; anything but 1000/1001 keeps the session alive
const RESUMABLE_CLOSE: u16 = 4000;

/// What the outer loop does after a connection ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopAction {
    Shutdown,
    /// Reconnect, resuming when a session exists
    Resume,
    /// Discard the session and identify again
    Reidentify,
    /// Op 9; `resumable` comes from its payload
    InvalidSession { resumable: bool },
}

/// Data needed to resume
#[derive(Debug, Default)]
struct ResumeInfo {
    session_id: Option<String>,
    resume_url: Option<String>,
}

/// Control handle for a running [`GatewaySession`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Last dispatch sequence number seen
    pub fn sequence(&self) -> Option<u64> {
        self.shared.sequence()
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.shared.latency()
    }

    /// Ask the session to close the socket with 1000 and stop
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Change the client's presence
    ///
    /// Sent right away on a live socket. The presence is also kept and
    /// included in every later identify, so it survives re-identifies and
    /// may be set before the first connect.
    pub async fn update_presence(&self, presence: PresenceUpdatePayload) -> Result<(), GatewayError> {
        if !presence.is_valid_status() {
            return Err(GatewayError::InvalidStatus(presence.status));
        }
        let message = GatewayMessage::presence_update(&presence);
        self.shared.set_presence(presence);

        match self.shared.outbound() {
            Some(outbound) => {
                if outbound.send(Outbound::Payload(message)).await.is_err() {
                    tracing::debug!("Socket closed, presence applies on the next identify");
                }
            }
            None => tracing::debug!("Not connected, presence applies on the next identify"),
        }
        Ok(())
    }
}

pub struct GatewaySession {
    config: Arc<ClientConfig>,
    dispatcher: PacketDispatcher,
    shared: Arc<SessionShared>,
    resume: ResumeInfo,
    shutdown: watch::Receiver<bool>,
    identify_throttle: IdentifyThrottle,
    /// A READY was seen at some point, so the next one is a reconnect
    has_connected: bool,
    /// Reached `Connected` during the current attempt
    connected_this_attempt: bool,
}

impl GatewaySession {
    pub fn new(config: Arc<ClientConfig>, dispatcher: PacketDispatcher) -> (Self, SessionHandle) {
        let shared = Arc::new(SessionShared::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let session = Self {
            identify_throttle: IdentifyThrottle::new(config.identify_interval()),
            config,
            dispatcher,
            shared: Arc::clone(&shared),
            resume: ResumeInfo::default(),
            shutdown: shutdown_rx,
            has_connected: false,
            connected_this_attempt: false,
        };
        let handle = SessionHandle {
            shared,
            shutdown: Arc::new(shutdown_tx),
        };
        (session, handle)
    }

    /// Run until shutdown or a fatal error
    pub async fn run(mut self) -> Result<(), GatewayError> {
        let gateway = &self.config.gateway;
        let mut backoff = Backoff::new(gateway.backoff_base_ms, gateway.backoff_max_ms);
        let max_attempts = gateway.max_reconnect_attempts;
        let mut failures: u32 = 0;

        let result = loop {
            if self.is_shutdown() {
                break Ok(());
            }

            self.connected_this_attempt = false;
            let outcome = self.connect_and_run().await;

            if self.connected_this_attempt {
                backoff.reset();
                failures = 0;
            }

            let action = match outcome {
                Ok(LoopAction::Shutdown) | Err(GatewayError::Shutdown) => break Ok(()),
                Ok(action) => action,
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "Gateway session ended");
                    break Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Gateway connection failed");
                    LoopAction::Resume
                }
            };

            if self.connected_this_attempt {
                self.dispatcher.emit(Event::LostConnection);
            }

            failures = failures.saturating_add(1);
            if let Some(max) = max_attempts {
                if failures > max {
                    tracing::error!(max, "Reconnect attempts exhausted");
                    break Err(GatewayError::ReconnectAttemptsExhausted(max));
                }
            }

            let delay = self.prepare_reconnect(action, &mut backoff);
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                attempt = failures,
                resume = self.can_resume(),
                "Reconnecting"
            );
            if self.sleep_or_shutdown(delay).await.is_err() {
                break Ok(());
            }
        };

        self.shared.state.set(SessionState::Disconnected);
        result
    }

    /// Update session data for the next attempt and pick its delay
    fn prepare_reconnect(&mut self, action: LoopAction, backoff: &mut Backoff) -> Duration {
        match action {
            LoopAction::InvalidSession { resumable } => {
                if !resumable {
                    self.clear_session();
                }
                self.mark_reconnecting();
                invalid_session_delay()
            }
            LoopAction::Reidentify => {
                self.clear_session();
                self.mark_reconnecting();
                backoff.next_delay()
            }
            LoopAction::Resume | LoopAction::Shutdown => {
                self.mark_reconnecting();
                backoff.next_delay()
            }
        }
    }

    fn mark_reconnecting(&self) {
        if self.can_resume() {
            self.shared.state.set(SessionState::Resuming);
        } else {
            self.shared.state.set(SessionState::Disconnected);
        }
    }

    fn can_resume(&self) -> bool {
        self.resume.session_id.is_some() && self.shared.sequence().is_some()
    }

    fn clear_session(&mut self) {
        self.resume = ResumeInfo::default();
        self.shared.clear_sequence();
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn sleep_or_shutdown(&mut self, delay: Duration) -> Result<(), GatewayError> {
        tokio::select! {
            biased;
            _ = self.shutdown.wait_for(|stop| *stop) => Err(GatewayError::Shutdown),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// One socket from connect to close
    async fn connect_and_run(&mut self) -> Result<LoopAction, GatewayError> {
        let resuming = self.can_resume();
        let url = match (&self.resume.resume_url, resuming) {
            (Some(url), true) => with_query(url, &self.config.gateway_url),
            _ => self.config.gateway_url.clone(),
        };
        if !resuming {
            self.shared.state.set(SessionState::Connecting);
            let wait = self.identify_throttle.next_slot();
            if !wait.is_zero() {
                tracing::info!(wait_ms = wait.as_millis() as u64, "Waiting for an identify slot");
                if self.sleep_or_shutdown(wait).await.is_err() {
                    return Ok(LoopAction::Shutdown);
                }
            }
        }
        tracing::info!(url = %url, resuming, "Connecting to gateway");

        let (mut writer, mut reader) = tokio::select! {
            biased;
            _ = self.shutdown.wait_for(|stop| *stop) => return Ok(LoopAction::Shutdown),
            connected = socket::connect(&url) => connected?,
        };

        let hello = match socket::wait_for_hello(&mut reader, self.config.hello_timeout(), &mut self.shutdown).await {
            Ok(hello) => hello,
            Err(GatewayError::Shutdown) => {
                tracing::info!("Gateway shutdown requested before Hello");
                socket::send_close(&mut writer, 1000, "shutdown").await;
                return Ok(LoopAction::Shutdown);
            }
            Err(e) => return Err(e),
        };
        let interval = Duration::from_millis(hello.heartbeat_interval);
        tracing::debug!(heartbeat_interval_ms = hello.heartbeat_interval, "Received Hello");

        self.shared.reset_heartbeat();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let mut writer_task = socket::spawn_writer(writer, outbound_rx);
        self.shared.attach_outbound(outbound_tx.clone());

        self.shared.state.set(SessionState::Identifying);
        let handshake = if resuming {
            self.resume_message()
        } else {
            self.dispatcher.reset_session();
            self.identify_message()
        };
        let action = if outbound_tx.send(Outbound::Payload(handshake)).await.is_err() {
            Err(GatewayError::Protocol("writer closed before handshake".into()))
        } else {
            let (zombie_tx, zombie_rx) = oneshot::channel();
            let heartbeat = tokio::spawn(run_heartbeat(
                interval,
                Arc::clone(&self.shared),
                outbound_tx.clone(),
                zombie_tx,
            ));
            let action = self.event_loop(&mut reader, &outbound_tx, zombie_rx).await;
            heartbeat.abort();
            action
        };

        let (code, reason) = match &action {
            Ok(LoopAction::Shutdown) => (1000, "shutdown"),
            Ok(LoopAction::Reidentify) => (1000, "reidentify"),
            _ => (RESUMABLE_CLOSE, "reconnecting"),
        };
        self.shared.detach_outbound();
        if outbound_tx.send(Outbound::Close(code, reason)).await.is_err() {
            tracing::debug!(code, "Writer already stopped, close frame not sent");
        }
        drop(outbound_tx);
        if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut writer_task).await.is_err() {
            writer_task.abort();
        }

        action
    }

    fn identify_message(&self) -> GatewayMessage {
        let token = gateway_token(&self.config.token);
        let shard = self.config.shard;
        GatewayMessage::identify(&IdentifyPayload {
            token: token.to_string(),
            intents: self.config.intents,
            properties: IdentifyProperties::new(),
            shard: Some([shard.id, shard.count]),
            large_threshold: Some(self.config.gateway.large_threshold),
            presence: self.shared.presence(),
        })
    }

    fn resume_message(&self) -> GatewayMessage {
        GatewayMessage::resume(&ResumePayload {
            token: gateway_token(&self.config.token).to_string(),
            session_id: self.resume.session_id.clone().unwrap_or_default(),
            seq: self.shared.sequence().unwrap_or(0),
        })
    }

    async fn event_loop(
        &mut self,
        reader: &mut WsReader,
        outbound: &mpsc::Sender<Outbound>,
        zombie: oneshot::Receiver<()>,
    ) -> Result<LoopAction, GatewayError> {
        // The heartbeat task may drop its sender without signalling
        let mut zombie = zombie.fuse();
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.wait_for(|stop| *stop) => {
                    tracing::info!("Gateway shutdown requested");
                    return Ok(LoopAction::Shutdown);
                }
                Ok(()) = &mut zombie => {
                    return Ok(LoopAction::Resume);
                }
                frame = reader.next() => frame,
            };

            let message = match frame {
                Some(Ok(Message::Text(text))) => decode(&text),
                Some(Ok(Message::Binary(bytes))) => decode_bytes(&bytes),
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.as_ref().map(|f| u16::from(f.code));
                    let reason = frame.as_ref().map(|f| f.reason.to_string()).unwrap_or_default();
                    return self.handle_close(code, &reason);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Socket read failed");
                    self.shared.state.begin_reconnect();
                    return Ok(LoopAction::Resume);
                }
                None => {
                    tracing::warn!("Socket stream ended");
                    self.shared.state.begin_reconnect();
                    return Ok(LoopAction::Resume);
                }
            };

            match message {
                Ok(message) => {
                    if let Some(action) = self.handle_message(message, outbound).await {
                        return Ok(action);
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Dropping malformed frame"),
            }
        }
    }

    fn handle_close(&mut self, code: Option<u16>, reason: &str) -> Result<LoopAction, GatewayError> {
        match classify(code) {
            CloseAction::Fatal => Err(close_error(code, reason)),
            CloseAction::Reidentify => {
                tracing::info!(code = ?code, reason, "Gateway closed the session, identifying again");
                self.shared.state.begin_reconnect();
                Ok(LoopAction::Reidentify)
            }
            CloseAction::Resume => {
                tracing::info!(code = ?code, reason, "Gateway closed the socket, resuming");
                self.shared.state.begin_reconnect();
                Ok(LoopAction::Resume)
            }
        }
    }

    async fn handle_message(
        &mut self,
        message: GatewayMessage,
        outbound: &mpsc::Sender<Outbound>,
    ) -> Option<LoopAction> {
        match message.op {
            OpCode::Dispatch => {
                self.handle_dispatch(message);
                None
            }
            OpCode::Heartbeat => {
                let beat = GatewayMessage::heartbeat(self.shared.sequence());
                if outbound.send(Outbound::Payload(beat)).await.is_err() {
                    tracing::debug!("Writer closed, requested heartbeat not sent");
                }
                None
            }
            OpCode::HeartbeatAck => {
                self.shared.heartbeat_acked();
                None
            }
            OpCode::Reconnect => {
                tracing::info!("Gateway requested a reconnect");
                self.shared.state.begin_reconnect();
                Some(LoopAction::Resume)
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                tracing::info!(resumable, "Gateway invalidated the session");
                Some(LoopAction::InvalidSession { resumable })
            }
            OpCode::Hello => {
                tracing::debug!("Unexpected Hello mid-session");
                None
            }
            op => {
                tracing::debug!(op = %op, "Ignoring opcode");
                None
            }
        }
    }

    fn handle_dispatch(&mut self, message: GatewayMessage) {
        let GatewayMessage { d, s, t, .. } = message;
        if let Some(seq) = s {
            self.shared.observe_sequence(seq);
        }
        let Some(packet_type) = t else {
            tracing::debug!(seq = ?s, "Dispatch without a packet type");
            return;
        };

        let mut reconnected = false;
        match packet_type.as_str() {
            "READY" => {
                let ready = d.clone().map(serde_json::from_value::<ReadyPayload>);
                match ready {
                    Some(Ok(ready)) => {
                        self.resume.session_id = Some(ready.session_id);
                        self.resume.resume_url = ready.resume_gateway_url;
                    }
                    Some(Err(e)) => tracing::warn!(error = %e, "Unreadable READY payload"),
                    None => tracing::warn!("READY without payload"),
                }
                self.shared.state.set(SessionState::Connected);
                self.connected_this_attempt = true;
                reconnected = self.has_connected;
                self.has_connected = true;
            }
            "RESUMED" => {
                tracing::info!(seq = ?self.shared.sequence(), "Session resumed");
                self.shared.state.set(SessionState::Connected);
                self.connected_this_attempt = true;
                self.has_connected = true;
            }
            _ => {}
        }

        if let Err(e) = self.dispatcher.dispatch(&packet_type, d, s) {
            tracing::warn!(packet_type = %packet_type, error = %e, "Dropping dispatch");
        }
        if reconnected {
            self.dispatcher.emit(Event::Reconnect);
        }
    }
}

// Covers an aborted `run` too
impl Drop for GatewaySession {
    fn drop(&mut self) {
        self.shared.detach_outbound();
        self.shared.state.set(SessionState::Disconnected);
    }
}

/// Gateway auth takes the bare token
fn gateway_token(token: &str) -> &str {
    token.strip_prefix("Bot ").unwrap_or(token)
}

/// Resume URLs come without the version and encoding query
fn with_query(resume_url: &str, gateway_url: &str) -> String {
    if resume_url.contains('?') {
        return resume_url.to_string();
    }
    match gateway_url.split_once('?') {
        Some((_, query)) => format!("{}/?{query}", resume_url.trim_end_matches('/')),
        None => resume_url.to_string(),
    }
}
