//! Payload definitions
//!
//! The `d` field of the gateway messages this client sends or interprets
//! itself. Dispatch payloads for entities are decoded by the packet
//! handlers.

use chat_core::{Intents, Snowflake, User};
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    /// `[shard_id, shard_count]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    /// Member count above which offline members are not sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u16>,
    /// Presence to start the session with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdatePayload>,
}

/// Connection properties sent with identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentifyProperties {
    /// Library name for `browser` and `device`
    pub const LIBRARY: &'static str = "chat-client";

    #[must_use]
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: Self::LIBRARY.to_string(),
            device: Self::LIBRARY.to_string(),
        }
    }

    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received
    pub seq: u64,
}

/// Payload for op 3 (Presence Update)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    /// Unix time in milliseconds the client went idle
    pub since: Option<u64>,
    #[serde(default)]
    pub activities: Vec<serde_json::Value>,
    /// online, idle, dnd, invisible, or offline
    pub status: String,
    pub afk: bool,
}

impl PresenceUpdatePayload {
    pub const VALID_STATUSES: &'static [&'static str] =
        &["online", "idle", "dnd", "invisible", "offline"];

    #[must_use]
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status: status.into(),
            afk: false,
        }
    }

    #[must_use]
    pub fn is_valid_status(&self) -> bool {
        Self::VALID_STATUSES.contains(&self.status.as_str())
    }
}

/// `d` of the READY dispatch
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    /// URL to reconnect to when resuming this session
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    pub user: User,
    #[serde(default)]
    pub guilds: Vec<UnavailableServer>,
    #[serde(default)]
    pub shard: Option<[u32; 2]>,
}

/// Server entry in READY, filled in later by GUILD_CREATE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnavailableServer {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}
