//! # chat-cache
//!
//! In-memory cache of the entities the gateway has reported.
//!
//! ## Features
//!
//! - **Snapshots**: every entity is stored as an `Arc`; updates swap the whole
//!   value so readers never observe a half-applied packet
//! - **Single writer**: [`EntityCache::new`] hands out exactly one
//!   [`CacheWriter`], owned by the packet dispatcher
//! - **Bounded messages**: each channel keeps its most recent messages only
//!
//! ## Example
//!
//! ```ignore
//! use chat_cache::{EntityCache, EntityKind};
//!
//! let (cache, writer) = EntityCache::new();
//! writer.upsert_server(server);
//!
//! let server = cache.get(EntityKind::Server, server_id);
//! ```

pub mod store;

pub use store::{
    CacheStats, CacheWriter, CachedEntity, EntityCache, EntityKind, DEFAULT_MESSAGE_CAPACITY,
};
