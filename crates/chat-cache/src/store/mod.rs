//! In-memory entity store

mod arena;
mod cache;
mod entity;

pub use cache::{CacheStats, CacheWriter, EntityCache, DEFAULT_MESSAGE_CAPACITY};
pub use entity::{CachedEntity, EntityKind};
