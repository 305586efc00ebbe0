//! Entity cache
//!
//! `EntityCache` is the cloneable, read-only handle given to user code and
//! the REST layer. `CacheWriter` is the only way to mutate the cache; exactly
//! one exists per cache and it is owned by the gateway packet dispatcher.

use chat_core::{Channel, Message, Role, Server, Snowflake, User};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::arena::Arena;
use super::entity::{CachedEntity, EntityKind};

/// Messages kept per channel before the oldest is evicted
pub const DEFAULT_MESSAGE_CAPACITY: usize = 50;

struct Inner {
    servers: Arena<Server>,
    channels: Arena<Channel>,
    roles: Arena<Role>,
    users: Arena<User>,
    messages: Arena<Message>,
    /// Cached message ids per channel, oldest first
    message_order: Mutex<HashMap<Snowflake, VecDeque<Snowflake>>>,
    message_capacity: usize,
    current_user: RwLock<Option<Snowflake>>,
}

/// Entry counts, mostly for logs and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub servers: usize,
    pub channels: usize,
    pub roles: usize,
    pub users: usize,
    pub messages: usize,
}

/// Read-only view of the cache
#[derive(Clone)]
pub struct EntityCache {
    inner: Arc<Inner>,
}

/// Exclusive write access to the cache
pub struct CacheWriter {
    inner: Arc<Inner>,
}

impl EntityCache {
    /// Create an empty cache and its single writer
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (EntityCache, CacheWriter) {
        Self::with_message_capacity(DEFAULT_MESSAGE_CAPACITY)
    }

    pub fn with_message_capacity(capacity: usize) -> (EntityCache, CacheWriter) {
        let inner = Arc::new(Inner {
            servers: Arena::new(),
            channels: Arena::new(),
            roles: Arena::new(),
            users: Arena::new(),
            messages: Arena::new(),
            message_order: Mutex::new(HashMap::new()),
            message_capacity: capacity,
            current_user: RwLock::new(None),
        });
        (
            EntityCache {
                inner: Arc::clone(&inner),
            },
            CacheWriter { inner },
        )
    }

    pub fn server(&self, id: Snowflake) -> Option<Arc<Server>> {
        self.inner.servers.get(id)
    }

    pub fn channel(&self, id: Snowflake) -> Option<Arc<Channel>> {
        self.inner.channels.get(id)
    }

    pub fn role(&self, id: Snowflake) -> Option<Arc<Role>> {
        self.inner.roles.get(id)
    }

    pub fn user(&self, id: Snowflake) -> Option<Arc<User>> {
        self.inner.users.get(id)
    }

    pub fn message(&self, id: Snowflake) -> Option<Arc<Message>> {
        self.inner.messages.get(id)
    }

    /// Untyped lookup by kind and id
    pub fn get(&self, kind: EntityKind, id: Snowflake) -> Option<CachedEntity> {
        match kind {
            EntityKind::Server => self.server(id).map(CachedEntity::Server),
            EntityKind::Channel => self.channel(id).map(CachedEntity::Channel),
            EntityKind::Role => self.role(id).map(CachedEntity::Role),
            EntityKind::User => self.user(id).map(CachedEntity::User),
            EntityKind::Message => self.message(id).map(CachedEntity::Message),
        }
    }

    pub fn servers(&self) -> Vec<Arc<Server>> {
        self.inner.servers.values()
    }

    /// Channels of a server, ordered by position
    pub fn channels_in(&self, server_id: Snowflake) -> Vec<Arc<Channel>> {
        let mut channels = self
            .inner
            .channels
            .filter(|c| c.server_id == Some(server_id));
        channels.sort_by_key(|c| (c.position, c.id));
        channels
    }

    /// Roles of a server, lowest first
    pub fn roles_in(&self, server_id: Snowflake) -> Vec<Arc<Role>> {
        let mut roles = self.inner.roles.filter(|r| r.server_id == server_id);
        // Same ordering as Role::is_higher_than
        roles.sort_by_key(|r| (r.position, std::cmp::Reverse(r.id)));
        roles
    }

    /// Cached messages of a channel, oldest first
    pub fn messages_in(&self, channel_id: Snowflake) -> Vec<Arc<Message>> {
        let order = self.inner.message_order.lock();
        order
            .get(&channel_id)
            .map(|ids| ids.iter().filter_map(|id| self.inner.messages.get(*id)).collect())
            .unwrap_or_default()
    }

    /// The account this client is logged in as, once READY was received
    pub fn current_user(&self) -> Option<Arc<User>> {
        let id = (*self.inner.current_user.read())?;
        self.user(id)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            servers: self.inner.servers.len(),
            channels: self.inner.channels.len(),
            roles: self.inner.roles.len(),
            users: self.inner.users.len(),
            messages: self.inner.messages.len(),
        }
    }
}

impl CacheWriter {
    /// Read handle onto the same cache
    pub fn reader(&self) -> EntityCache {
        EntityCache {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn set_current_user(&self, user: User) {
        let id = user.id;
        self.inner.users.insert(id, user);
        *self.inner.current_user.write() = Some(id);
    }

    pub fn upsert_server(&self, server: Server) -> Option<Arc<Server>> {
        self.inner.servers.insert(server.id, server)
    }

    /// Remove a server together with its roles, channels, and their messages
    pub fn remove_server(&self, id: Snowflake) -> Option<Arc<Server>> {
        let removed = self.inner.servers.remove(id);

        let roles = self.inner.roles.remove_where(|r| r.server_id == id);
        let channels = self
            .inner
            .channels
            .remove_where(|c| c.server_id == Some(id));
        for channel_id in &channels {
            self.drop_channel_messages(*channel_id);
        }

        tracing::debug!(
            server_id = %id,
            roles = roles.len(),
            channels = channels.len(),
            "Server removed from cache"
        );

        removed
    }

    pub fn upsert_channel(&self, channel: Channel) -> Option<Arc<Channel>> {
        self.inner.channels.insert(channel.id, channel)
    }

    pub fn remove_channel(&self, id: Snowflake) -> Option<Arc<Channel>> {
        self.drop_channel_messages(id);
        self.inner.channels.remove(id)
    }

    pub fn upsert_role(&self, role: Role) -> Option<Arc<Role>> {
        self.inner.roles.insert(role.id, role)
    }

    pub fn remove_role(&self, id: Snowflake) -> Option<Arc<Role>> {
        self.inner.roles.remove(id)
    }

    pub fn upsert_user(&self, user: User) -> Option<Arc<User>> {
        self.inner.users.insert(user.id, user)
    }

    /// Cache a message, evicting the channel's oldest once over capacity
    pub fn upsert_message(&self, message: Message) -> Option<Arc<Message>> {
        if self.inner.message_capacity == 0 {
            return None;
        }

        let id = message.id;
        let channel_id = message.channel_id;
        let previous = self.inner.messages.insert(id, message);
        if previous.is_some() {
            return previous;
        }

        let mut order = self.inner.message_order.lock();
        let ids = order.entry(channel_id).or_default();
        ids.push_back(id);
        while ids.len() > self.inner.message_capacity {
            if let Some(evicted) = ids.pop_front() {
                self.inner.messages.remove(evicted);
            }
        }
        None
    }

    pub fn remove_message(&self, id: Snowflake) -> Option<Arc<Message>> {
        let removed = self.inner.messages.remove(id)?;
        let mut order = self.inner.message_order.lock();
        if let Some(ids) = order.get_mut(&removed.channel_id) {
            ids.retain(|m| *m != id);
        }
        Some(removed)
    }

    fn drop_channel_messages(&self, channel_id: Snowflake) {
        let ids = self.inner.message_order.lock().remove(&channel_id);
        for id in ids.into_iter().flatten() {
            self.inner.messages.remove(id);
        }
    }
}
