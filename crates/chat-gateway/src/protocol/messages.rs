//! Gateway message format
//!
//! Every frame in either direction is a `{op, d, s, t}` envelope.

use super::{
    HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, ResumePayload,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: OpCode,

    /// Event data payload
    #[serde(default)]
    pub d: Option<Value>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Packet type (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    fn with_payload(op: OpCode, payload: &impl Serialize) -> Self {
        Self {
            op,
            d: Some(serde_json::to_value(payload).unwrap_or_default()),
            s: None,
            t: None,
        }
    }

    // === Client Messages ===

    /// Identify (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::with_payload(OpCode::Identify, payload)
    }

    /// Resume (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::with_payload(OpCode::Resume, payload)
    }

    /// Heartbeat (op=1) carrying the last sequence received
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            d: Some(last_sequence.map_or(Value::Null, Value::from)),
            s: None,
            t: None,
        }
    }

    /// Presence Update (op=3)
    #[must_use]
    pub fn presence_update(payload: &PresenceUpdatePayload) -> Self {
        Self::with_payload(OpCode::PresenceUpdate, payload)
    }

    // === Server Messages ===

    /// Dispatch (op=0)
    #[must_use]
    pub fn dispatch(packet_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: Some(data),
            s: Some(sequence),
            t: Some(packet_type.into()),
        }
    }

    /// Hello (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::with_payload(OpCode::Hello, &HelloPayload::with_interval(heartbeat_interval))
    }

    /// Heartbeat ACK (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self {
            op: OpCode::HeartbeatAck,
            d: None,
            s: None,
            t: None,
        }
    }

    /// Reconnect (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self {
            op: OpCode::Reconnect,
            d: None,
            s: None,
            t: None,
        }
    }

    /// Invalid Session (op=9); `resumable` tells the client whether to resume
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self {
            op: OpCode::InvalidSession,
            d: Some(Value::Bool(resumable)),
            s: None,
            t: None,
        }
    }

    // === Parsing ===

    fn payload_as<T: DeserializeOwned>(&self, op: OpCode) -> Option<T> {
        if self.op != op {
            return None;
        }
        self.d.as_ref().and_then(|d| T::deserialize(d).ok())
    }

    pub fn as_hello(&self) -> Option<HelloPayload> {
        self.payload_as(OpCode::Hello)
    }

    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        self.payload_as(OpCode::Identify)
    }

    pub fn as_resume(&self) -> Option<ResumePayload> {
        self.payload_as(OpCode::Resume)
    }

    pub fn as_presence_update(&self) -> Option<PresenceUpdatePayload> {
        self.payload_as(OpCode::PresenceUpdate)
    }

    /// Sequence carried by a heartbeat (op=1)
    pub fn as_heartbeat_seq(&self) -> Option<Option<u64>> {
        if self.op != OpCode::Heartbeat {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_u64))
    }

    /// Resumable flag of an invalid session (op=9); a missing flag means no
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
