//! Channel entity - text, voice, category, or private channels

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelType {
    #[default]
    ServerText,
    PrivateText,
    ServerVoice,
    GroupPrivate,
    ServerCategory,
    ServerNews,
    /// Types added by newer API versions
    Unknown(u8),
}

impl ChannelType {
    #[inline]
    pub fn as_u8(self) -> u8 {
        u8::from(self)
    }

    pub fn is_server_channel(self) -> bool {
        !matches!(self, Self::PrivateText | Self::GroupPrivate)
    }
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::ServerText,
            1 => Self::PrivateText,
            2 => Self::ServerVoice,
            3 => Self::GroupPrivate,
            4 => Self::ServerCategory,
            5 => Self::ServerNews,
            other => Self::Unknown(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(ct: ChannelType) -> Self {
        match ct {
            ChannelType::ServerText => 0,
            ChannelType::PrivateText => 1,
            ChannelType::ServerVoice => 2,
            ChannelType::GroupPrivate => 3,
            ChannelType::ServerCategory => 4,
            ChannelType::ServerNews => 5,
            ChannelType::Unknown(value) => value,
        }
    }
}

/// Channel snapshot
///
/// `server_id` is a lookup-only back reference; the server does not own
/// its channels in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub channel_type: ChannelType,
    #[serde(rename = "guild_id", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<Snowflake>,
}

impl Channel {
    pub fn new_text(id: Snowflake, server_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            channel_type: ChannelType::ServerText,
            server_id: Some(server_id),
            name: Some(name.into()),
            topic: None,
            position: 0,
            parent_id: None,
            nsfw: false,
            last_message_id: None,
        }
    }

    #[inline]
    pub fn is_private(&self) -> bool {
        !self.channel_type.is_server_channel()
    }

    /// Name for logs, `#name` or the id for unnamed private channels
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("#{name}"),
            None => self.id.to_string(),
        }
    }
}
