//! Packet dispatcher
//!
//! Routes each dispatch packet to its handler. Handlers apply the payload
//! to the entity cache and return the events describing what changed; the
//! dispatcher then resolves the interested listeners and queues delivery.
//!
//! The dispatcher owns the only [`CacheWriter`], and the session loop calls
//! it for one packet at a time, so cache writes happen in arrival order.

mod channel;
mod error;
mod message;
mod ready;
mod role;
mod server;
mod user;

pub use error::{HandlerError, HandlerResult};

use chat_cache::{CacheWriter, EntityCache};
use chat_core::Snowflake;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::events::{Event, ListenerRegistry, PacketType};
use crate::queue::EventQueue;

/// State shared by all handlers
pub(crate) struct HandlerContext {
    pub(crate) writer: CacheWriter,
    pub(crate) cache: EntityCache,
    /// Servers listed in READY whose GUILD_CREATE has not arrived yet
    pub(crate) pending_servers: HashSet<Snowflake>,
}

impl HandlerContext {
    fn new(writer: CacheWriter) -> Self {
        let cache = writer.reader();
        Self {
            writer,
            cache,
            pending_servers: HashSet::new(),
        }
    }
}

type HandlerFn = fn(&mut HandlerContext, Value) -> HandlerResult<Vec<Event>>;

pub(crate) fn parse<T: DeserializeOwned>(packet: PacketType, payload: Value) -> HandlerResult<T> {
    serde_json::from_value(payload).map_err(|source| HandlerError::InvalidPayload { packet, source })
}

pub struct PacketDispatcher {
    ctx: HandlerContext,
    handlers: HashMap<PacketType, HandlerFn>,
    registry: Arc<ListenerRegistry>,
    queue: EventQueue,
    last_seq: Option<u64>,
}

impl PacketDispatcher {
    pub fn new(writer: CacheWriter, registry: Arc<ListenerRegistry>, queue: EventQueue) -> Self {
        let mut handlers: HashMap<PacketType, HandlerFn> = HashMap::new();
        handlers.insert(PacketType::Ready, ready::ready);
        handlers.insert(PacketType::Resumed, ready::resumed);
        handlers.insert(PacketType::GuildCreate, server::create);
        handlers.insert(PacketType::GuildUpdate, server::update);
        handlers.insert(PacketType::GuildDelete, server::delete);
        handlers.insert(PacketType::GuildRoleCreate, role::create);
        handlers.insert(PacketType::GuildRoleUpdate, role::update);
        handlers.insert(PacketType::GuildRoleDelete, role::delete);
        handlers.insert(PacketType::ChannelCreate, channel::create);
        handlers.insert(PacketType::ChannelUpdate, channel::update);
        handlers.insert(PacketType::ChannelDelete, channel::delete);
        handlers.insert(PacketType::MessageCreate, message::create);
        handlers.insert(PacketType::MessageUpdate, message::update);
        handlers.insert(PacketType::MessageDelete, message::delete);
        handlers.insert(PacketType::UserUpdate, user::update);

        Self {
            ctx: HandlerContext::new(writer),
            handlers,
            registry,
            queue,
            last_seq: None,
        }
    }

    /// Apply one dispatch packet and queue the resulting events
    ///
    /// Returns the number of events produced. Packets without a handler and
    /// packets already processed (by sequence number) produce none.
    pub fn dispatch(
        &mut self,
        packet_type: &str,
        payload: Option<Value>,
        seq: Option<u64>,
    ) -> HandlerResult<usize> {
        if let Some(seq) = seq {
            if self.last_seq.is_some_and(|last| seq <= last) {
                tracing::debug!(seq, packet_type, "Dropping replayed dispatch");
                return Ok(0);
            }
            self.last_seq = Some(seq);
        }

        let events = self.handle(packet_type, payload)?;
        let count = events.len();
        for event in events {
            self.emit(event);
        }
        Ok(count)
    }

    /// Run the handler without delivering its events
    pub(crate) fn handle(
        &mut self,
        packet_type: &str,
        payload: Option<Value>,
    ) -> HandlerResult<Vec<Event>> {
        let Some(packet) = PacketType::from_str(packet_type) else {
            tracing::debug!(packet_type, "Ignoring packet without a handler");
            return Ok(Vec::new());
        };
        let Some(&handler) = self.handlers.get(&packet) else {
            tracing::warn!(packet = %packet, "No handler registered");
            return Ok(Vec::new());
        };
        let payload = match payload {
            Some(payload) => payload,
            // RESUMED carries nothing we read
            None if packet == PacketType::Resumed => Value::Null,
            None => return Err(HandlerError::MissingPayload(packet)),
        };
        handler(&mut self.ctx, payload)
    }

    /// Hand an event to its listeners through the queue
    pub fn emit(&self, event: Event) {
        let listeners = self.registry.listeners_for(&event);
        if listeners.is_empty() {
            return;
        }
        let key = event.ordering_key();
        self.queue.dispatch_event(key, listeners, Arc::new(event));
    }

    /// Start over for a fresh identify
    ///
    /// Forgets the last sequence number. The cache is kept; the READY that
    /// follows prunes servers the new session no longer has.
    pub fn reset_session(&mut self) {
        self.last_seq = None;
        self.ctx.pending_servers.clear();
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn cache(&self) -> &EntityCache {
        &self.ctx.cache
    }
}
