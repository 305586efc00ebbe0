//! Id-keyed map of shared snapshots

use chat_core::Snowflake;
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent map from snowflake to an immutable snapshot
///
/// Writes replace the whole `Arc`, so a reader either sees the previous
/// snapshot or the new one, never a partially updated entity.
pub(crate) struct Arena<T> {
    entries: DashMap<Snowflake, Arc<T>>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, id: Snowflake) -> Option<Arc<T>> {
        self.entries.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Swap in a new snapshot, returning the one it replaced
    pub(crate) fn insert(&self, id: Snowflake, value: T) -> Option<Arc<T>> {
        self.entries.insert(id, Arc::new(value))
    }

    pub(crate) fn remove(&self, id: Snowflake) -> Option<Arc<T>> {
        self.entries.remove(&id).map(|(_, v)| v)
    }

    /// Snapshots matching `predicate`
    pub(crate) fn filter<F>(&self, predicate: F) -> Vec<Arc<T>>
    where
        F: Fn(&T) -> bool,
    {
        self.entries
            .iter()
            .filter(|r| predicate(r.value()))
            .map(|r| Arc::clone(r.value()))
            .collect()
    }

    /// Drop every entry matching `predicate`, returning the removed ids
    pub(crate) fn remove_where<F>(&self, predicate: F) -> Vec<Snowflake>
    where
        F: Fn(&T) -> bool,
    {
        let mut removed = Vec::new();
        self.entries.retain(|id, value| {
            if predicate(value) {
                removed.push(*id);
                false
            } else {
                true
            }
        });
        removed
    }

    pub(crate) fn values(&self) -> Vec<Arc<T>> {
        self.entries.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
