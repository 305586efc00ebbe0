//! Listener scopes and ordering keys

use chat_core::Snowflake;
use std::fmt;

/// What a listener is attached to
///
/// A `Global` listener sees every event of its type; the others only see
/// events touching that server, channel, user, or object (role, message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Server(Snowflake),
    Channel(Snowflake),
    User(Snowflake),
    Object(Snowflake),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Server(id) => write!(f, "server:{id}"),
            Self::Channel(id) => write!(f, "channel:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::Object(id) => write!(f, "object:{id}"),
        }
    }
}

/// Events with the same key are delivered in production order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderingKey {
    /// Lifecycle events and events outside any server
    Global,
    Server(Snowflake),
}

impl OrderingKey {
    pub fn for_server(server_id: Option<Snowflake>) -> Self {
        server_id.map_or(Self::Global, Self::Server)
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Server(id) => write!(f, "server:{id}"),
        }
    }
}
