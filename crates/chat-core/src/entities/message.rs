//! Message entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::value_objects::Snowflake;

/// Message snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(rename = "guild_id", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    #[inline]
    pub fn is_private(&self) -> bool {
        self.server_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    pub size: u64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}
