//! Entity kinds for untyped lookups

use chat_core::{Channel, Message, Role, Server, Snowflake, User};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Server,
    Channel,
    Role,
    User,
    Message,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::User => "user",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of any cached entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedEntity {
    Server(Arc<Server>),
    Channel(Arc<Channel>),
    Role(Arc<Role>),
    User(Arc<User>),
    Message(Arc<Message>),
}

impl CachedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Server(_) => EntityKind::Server,
            Self::Channel(_) => EntityKind::Channel,
            Self::Role(_) => EntityKind::Role,
            Self::User(_) => EntityKind::User,
            Self::Message(_) => EntityKind::Message,
        }
    }

    pub fn id(&self) -> Snowflake {
        match self {
            Self::Server(s) => s.id,
            Self::Channel(c) => c.id,
            Self::Role(r) => r.id,
            Self::User(u) => u.id,
            Self::Message(m) => m.id,
        }
    }

    pub fn as_server(&self) -> Option<&Arc<Server>> {
        match self {
            Self::Server(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&Arc<Channel>> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_role(&self) -> Option<&Arc<Role>> {
        match self {
            Self::Role(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&Arc<User>> {
        match self {
            Self::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Arc<Message>> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }
}
