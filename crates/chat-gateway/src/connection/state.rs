//! Session state shared between the read loop and the heartbeat task

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::socket::Outbound;
use crate::protocol::PresenceUpdatePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Identifying = 2,
    Connected = 3,
    Resuming = 4,
}

impl SessionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Identifying,
            3 => Self::Connected,
            4 => Self::Resuming,
            _ => Self::Disconnected,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Identifying => "identifying",
            Self::Connected => "connected",
            Self::Resuming => "resuming",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic session state with change notification
///
/// Reconnect requests go through [`StateCell::begin_reconnect`], a
/// compare-and-swap, so when the heartbeat and the read loop both notice a
/// dead socket only one of them wins.
#[derive(Debug)]
pub(crate) struct StateCell {
    value: AtomicU8,
    notify: watch::Sender<SessionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (notify, _) = watch::channel(SessionState::Disconnected);
        Self {
            value: AtomicU8::new(SessionState::Disconnected as u8),
            notify,
        }
    }

    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_u8(self.value.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: SessionState) {
        let previous = SessionState::from_u8(self.value.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Session state changed");
        }
        self.notify.send_replace(self.get());
    }

    /// Move `from -> to` only if the state is still `from`
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let swapped = self
            .value
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            tracing::debug!(from = %from, to = %to, "Session state changed");
            self.notify.send_replace(self.get());
        }
        swapped
    }

    /// Claim the reconnect of a live socket; `false` if someone already did
    pub(crate) fn begin_reconnect(&self) -> bool {
        self.transition(SessionState::Connected, SessionState::Resuming)
            || self.transition(SessionState::Identifying, SessionState::Resuming)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.notify.subscribe()
    }
}

#[derive(Debug, Default)]
struct HeartbeatStatus {
    awaiting_ack: bool,
    last_sent: Option<Instant>,
    latency: Option<Duration>,
}

/// State owned by one session lineage and read by the heartbeat task
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) state: StateCell,
    sequence: Mutex<Option<u64>>,
    heartbeat: Mutex<HeartbeatStatus>,
    /// Writer queue of the live socket
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
    /// Last presence asked for, sent again with every identify
    presence: Mutex<Option<PresenceUpdatePayload>>,
}

impl SessionShared {
    pub(crate) fn new() -> Self {
        Self {
            state: StateCell::new(),
            sequence: Mutex::new(None),
            heartbeat: Mutex::new(HeartbeatStatus::default()),
            outbound: Mutex::new(None),
            presence: Mutex::new(None),
        }
    }

    pub(crate) fn sequence(&self) -> Option<u64> {
        *self.sequence.lock()
    }

    /// Record a dispatch sequence number; never moves backwards
    pub(crate) fn observe_sequence(&self, seq: u64) {
        let mut current = self.sequence.lock();
        if current.is_none_or(|c| seq > c) {
            *current = Some(seq);
        }
    }

    pub(crate) fn clear_sequence(&self) {
        *self.sequence.lock() = None;
    }

    /// Start of a new socket: nothing is outstanding
    pub(crate) fn reset_heartbeat(&self) {
        let mut hb = self.heartbeat.lock();
        hb.awaiting_ack = false;
        hb.last_sent = None;
    }

    /// Mark a heartbeat as sent; `false` if the previous one is still unacknowledged
    pub(crate) fn heartbeat_sent(&self) -> bool {
        let mut hb = self.heartbeat.lock();
        if hb.awaiting_ack {
            return false;
        }
        hb.awaiting_ack = true;
        hb.last_sent = Some(Instant::now());
        true
    }

    pub(crate) fn heartbeat_acked(&self) {
        let mut hb = self.heartbeat.lock();
        hb.awaiting_ack = false;
        if let Some(sent) = hb.last_sent {
            hb.latency = Some(sent.elapsed());
        }
    }

    pub(crate) fn latency(&self) -> Option<Duration> {
        self.heartbeat.lock().latency
    }

    pub(crate) fn attach_outbound(&self, sender: mpsc::Sender<Outbound>) {
        *self.outbound.lock() = Some(sender);
    }

    pub(crate) fn detach_outbound(&self) {
        self.outbound.lock().take();
    }

    pub(crate) fn outbound(&self) -> Option<mpsc::Sender<Outbound>> {
        self.outbound.lock().clone()
    }

    pub(crate) fn set_presence(&self, presence: PresenceUpdatePayload) {
        *self.presence.lock() = Some(presence);
    }

    pub(crate) fn presence(&self) -> Option<PresenceUpdatePayload> {
        self.presence.lock().clone()
    }
}
