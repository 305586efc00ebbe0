//! Dispatch packet types
//!
//! The names carried in the `t` field of dispatch messages that this client
//! has handlers for.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketType {
    // Connection
    Ready,
    Resumed,

    // Servers
    GuildCreate,
    GuildUpdate,
    GuildDelete,

    // Roles
    GuildRoleCreate,
    GuildRoleUpdate,
    GuildRoleDelete,

    // Channels
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,

    // Messages
    MessageCreate,
    MessageUpdate,
    MessageDelete,

    // Users
    UserUpdate,
}

impl PacketType {
    pub const ALL: [PacketType; 15] = [
        Self::Ready,
        Self::Resumed,
        Self::GuildCreate,
        Self::GuildUpdate,
        Self::GuildDelete,
        Self::GuildRoleCreate,
        Self::GuildRoleUpdate,
        Self::GuildRoleDelete,
        Self::ChannelCreate,
        Self::ChannelUpdate,
        Self::ChannelDelete,
        Self::MessageCreate,
        Self::MessageUpdate,
        Self::MessageDelete,
        Self::UserUpdate,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::GuildRoleCreate => "GUILD_ROLE_CREATE",
            Self::GuildRoleUpdate => "GUILD_ROLE_UPDATE",
            Self::GuildRoleDelete => "GUILD_ROLE_DELETE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::UserUpdate => "USER_UPDATE",
        }
    }

    /// Parse a packet type name; `None` for packets without a handler
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
