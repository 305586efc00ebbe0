//! Typed events
//!
//! One tagged union for everything listeners can observe. Change events
//! carry the old and new value of the single field that changed; entity
//! references point at the cache snapshot taken right after the packet was
//! applied.

use chat_core::{Channel, Message, Permissions, Role, Server, Snowflake, User};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::{OrderingKey, Scope};

/// Old and new value of a changed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change<T> {
    pub old: T,
    pub new: T,
}

impl<T: PartialEq> Change<T> {
    /// `Some` only when the value actually changed
    pub fn diff(old: T, new: T) -> Option<Self> {
        (old != new).then_some(Self { old, new })
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    // Lifecycle
    Ready {
        session_id: String,
        user: Arc<User>,
        servers: usize,
    },
    Resumed,
    /// A fresh session was established after the previous one was lost
    Reconnect,
    LostConnection,

    // Servers
    ServerJoin {
        server: Arc<Server>,
    },
    ServerLeave {
        server: Arc<Server>,
    },
    ServerBecomesAvailable {
        server: Arc<Server>,
    },
    ServerBecomesUnavailable {
        server_id: Snowflake,
    },
    ServerChangeName {
        server: Arc<Server>,
        name: Change<String>,
    },

    // Roles
    RoleCreate {
        role: Arc<Role>,
    },
    RoleDelete {
        role: Arc<Role>,
    },
    RoleChangeColor {
        role: Arc<Role>,
        color: Change<u32>,
    },
    RoleChangeHoist {
        role: Arc<Role>,
        hoist: Change<bool>,
    },
    RoleChangeMentionable {
        role: Arc<Role>,
        mentionable: Change<bool>,
    },
    RoleChangeName {
        role: Arc<Role>,
        name: Change<String>,
    },
    RoleChangePermissions {
        role: Arc<Role>,
        permissions: Change<Permissions>,
    },
    RoleChangePosition {
        role: Arc<Role>,
        position: Change<i32>,
    },

    // Channels
    ChannelCreate {
        channel: Arc<Channel>,
    },
    ChannelDelete {
        channel: Arc<Channel>,
    },
    ChannelChangeName {
        channel: Arc<Channel>,
        name: Change<Option<String>>,
    },
    ChannelChangePosition {
        channel: Arc<Channel>,
        position: Change<i32>,
    },

    // Messages
    MessageCreate {
        message: Arc<Message>,
    },
    MessageEdit {
        message_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
        /// Only known when the message was cached
        message: Option<Arc<Message>>,
        old_content: Option<String>,
        new_content: String,
    },
    MessageDelete {
        message_id: Snowflake,
        channel_id: Snowflake,
        server_id: Option<Snowflake>,
        message: Option<Arc<Message>>,
    },

    // Users
    UserChangeName {
        user: Arc<User>,
        name: Change<String>,
    },
    UserChangeAvatar {
        user: Arc<User>,
        avatar: Change<Option<String>>,
    },
}

/// Fieldless tag of [`Event`], used as the listener registration key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Ready,
    Resumed,
    Reconnect,
    LostConnection,
    ServerJoin,
    ServerLeave,
    ServerBecomesAvailable,
    ServerBecomesUnavailable,
    ServerChangeName,
    RoleCreate,
    RoleDelete,
    RoleChangeColor,
    RoleChangeHoist,
    RoleChangeMentionable,
    RoleChangeName,
    RoleChangePermissions,
    RoleChangePosition,
    ChannelCreate,
    ChannelDelete,
    ChannelChangeName,
    ChannelChangePosition,
    MessageCreate,
    MessageEdit,
    MessageDelete,
    UserChangeName,
    UserChangeAvatar,
}

impl EventType {
    pub const ALL: [EventType; 26] = [
        Self::Ready,
        Self::Resumed,
        Self::Reconnect,
        Self::LostConnection,
        Self::ServerJoin,
        Self::ServerLeave,
        Self::ServerBecomesAvailable,
        Self::ServerBecomesUnavailable,
        Self::ServerChangeName,
        Self::RoleCreate,
        Self::RoleDelete,
        Self::RoleChangeColor,
        Self::RoleChangeHoist,
        Self::RoleChangeMentionable,
        Self::RoleChangeName,
        Self::RoleChangePermissions,
        Self::RoleChangePosition,
        Self::ChannelCreate,
        Self::ChannelDelete,
        Self::ChannelChangeName,
        Self::ChannelChangePosition,
        Self::MessageCreate,
        Self::MessageEdit,
        Self::MessageDelete,
        Self::UserChangeName,
        Self::UserChangeAvatar,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Resumed => "resumed",
            Self::Reconnect => "reconnect",
            Self::LostConnection => "lost_connection",
            Self::ServerJoin => "server_join",
            Self::ServerLeave => "server_leave",
            Self::ServerBecomesAvailable => "server_becomes_available",
            Self::ServerBecomesUnavailable => "server_becomes_unavailable",
            Self::ServerChangeName => "server_change_name",
            Self::RoleCreate => "role_create",
            Self::RoleDelete => "role_delete",
            Self::RoleChangeColor => "role_change_color",
            Self::RoleChangeHoist => "role_change_hoist",
            Self::RoleChangeMentionable => "role_change_mentionable",
            Self::RoleChangeName => "role_change_name",
            Self::RoleChangePermissions => "role_change_permissions",
            Self::RoleChangePosition => "role_change_position",
            Self::ChannelCreate => "channel_create",
            Self::ChannelDelete => "channel_delete",
            Self::ChannelChangeName => "channel_change_name",
            Self::ChannelChangePosition => "channel_change_position",
            Self::MessageCreate => "message_create",
            Self::MessageEdit => "message_edit",
            Self::MessageDelete => "message_delete",
            Self::UserChangeName => "user_change_name",
            Self::UserChangeAvatar => "user_change_avatar",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Ready { .. } => EventType::Ready,
            Self::Resumed => EventType::Resumed,
            Self::Reconnect => EventType::Reconnect,
            Self::LostConnection => EventType::LostConnection,
            Self::ServerJoin { .. } => EventType::ServerJoin,
            Self::ServerLeave { .. } => EventType::ServerLeave,
            Self::ServerBecomesAvailable { .. } => EventType::ServerBecomesAvailable,
            Self::ServerBecomesUnavailable { .. } => EventType::ServerBecomesUnavailable,
            Self::ServerChangeName { .. } => EventType::ServerChangeName,
            Self::RoleCreate { .. } => EventType::RoleCreate,
            Self::RoleDelete { .. } => EventType::RoleDelete,
            Self::RoleChangeColor { .. } => EventType::RoleChangeColor,
            Self::RoleChangeHoist { .. } => EventType::RoleChangeHoist,
            Self::RoleChangeMentionable { .. } => EventType::RoleChangeMentionable,
            Self::RoleChangeName { .. } => EventType::RoleChangeName,
            Self::RoleChangePermissions { .. } => EventType::RoleChangePermissions,
            Self::RoleChangePosition { .. } => EventType::RoleChangePosition,
            Self::ChannelCreate { .. } => EventType::ChannelCreate,
            Self::ChannelDelete { .. } => EventType::ChannelDelete,
            Self::ChannelChangeName { .. } => EventType::ChannelChangeName,
            Self::ChannelChangePosition { .. } => EventType::ChannelChangePosition,
            Self::MessageCreate { .. } => EventType::MessageCreate,
            Self::MessageEdit { .. } => EventType::MessageEdit,
            Self::MessageDelete { .. } => EventType::MessageDelete,
            Self::UserChangeName { .. } => EventType::UserChangeName,
            Self::UserChangeAvatar { .. } => EventType::UserChangeAvatar,
        }
    }

    /// Server the event belongs to, if any
    pub fn server_id(&self) -> Option<Snowflake> {
        match self {
            Self::ServerJoin { server }
            | Self::ServerLeave { server }
            | Self::ServerBecomesAvailable { server }
            | Self::ServerChangeName { server, .. } => Some(server.id),
            Self::ServerBecomesUnavailable { server_id } => Some(*server_id),
            Self::RoleCreate { role }
            | Self::RoleDelete { role }
            | Self::RoleChangeColor { role, .. }
            | Self::RoleChangeHoist { role, .. }
            | Self::RoleChangeMentionable { role, .. }
            | Self::RoleChangeName { role, .. }
            | Self::RoleChangePermissions { role, .. }
            | Self::RoleChangePosition { role, .. } => Some(role.server_id),
            Self::ChannelCreate { channel }
            | Self::ChannelDelete { channel }
            | Self::ChannelChangeName { channel, .. }
            | Self::ChannelChangePosition { channel, .. } => channel.server_id,
            Self::MessageCreate { message } => message.server_id,
            Self::MessageEdit { server_id, .. } | Self::MessageDelete { server_id, .. } => {
                *server_id
            }
            Self::Ready { .. }
            | Self::Resumed
            | Self::Reconnect
            | Self::LostConnection
            | Self::UserChangeName { .. }
            | Self::UserChangeAvatar { .. } => None,
        }
    }

    pub fn ordering_key(&self) -> OrderingKey {
        OrderingKey::for_server(self.server_id())
    }

    /// Non-global scopes the event touches, outermost first
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes = Vec::with_capacity(4);
        if let Some(server_id) = self.server_id() {
            scopes.push(Scope::Server(server_id));
        }

        match self {
            Self::RoleCreate { role }
            | Self::RoleDelete { role }
            | Self::RoleChangeColor { role, .. }
            | Self::RoleChangeHoist { role, .. }
            | Self::RoleChangeMentionable { role, .. }
            | Self::RoleChangeName { role, .. }
            | Self::RoleChangePermissions { role, .. }
            | Self::RoleChangePosition { role, .. } => scopes.push(Scope::Object(role.id)),
            Self::ChannelCreate { channel }
            | Self::ChannelDelete { channel }
            | Self::ChannelChangeName { channel, .. }
            | Self::ChannelChangePosition { channel, .. } => scopes.push(Scope::Channel(channel.id)),
            Self::MessageCreate { message } => {
                scopes.push(Scope::Channel(message.channel_id));
                scopes.push(Scope::User(message.author.id));
                scopes.push(Scope::Object(message.id));
            }
            Self::MessageEdit {
                message_id,
                channel_id,
                message,
                ..
            }
            | Self::MessageDelete {
                message_id,
                channel_id,
                message,
                ..
            } => {
                scopes.push(Scope::Channel(*channel_id));
                if let Some(message) = message {
                    scopes.push(Scope::User(message.author.id));
                }
                scopes.push(Scope::Object(*message_id));
            }
            Self::UserChangeName { user, .. } | Self::UserChangeAvatar { user, .. } => {
                scopes.push(Scope::User(user.id));
            }
            _ => {}
        }
        scopes
    }
}
