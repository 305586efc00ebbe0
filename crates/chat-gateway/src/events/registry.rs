//! Listener registry
//!
//! Maps `(EventType, Scope)` to the callbacks registered for it. Lookups
//! produce the global listeners first, then the listeners of every scope the
//! event touches, each list in registration order.

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{Event, EventType, Scope};

type Callback = dyn Fn(Arc<Event>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// A registered event callback
#[derive(Clone)]
pub struct Listener {
    callback: Arc<Callback>,
}

impl Listener {
    /// Wrap an async callback
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |event| f(event).boxed()),
        }
    }

    /// Wrap a synchronous callback
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self {
            callback: Arc::new(move |event| {
                let f = Arc::clone(&f);
                async move { f(&event) }.boxed()
            }),
        }
    }

    pub(crate) fn invoke(&self, event: Arc<Event>) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.callback)(event)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").finish_non_exhaustive()
    }
}

/// Returned by [`ListenerRegistry::register`]; pass back to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    event_type: EventType,
    scope: Scope,
}

impl ListenerHandle {
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<(EventType, Scope), Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, event_type: EventType, scope: Scope, listener: Listener) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry((event_type, scope))
            .or_default()
            .push((id, listener));

        tracing::debug!(event_type = %event_type, scope = %scope, id, "Listener registered");

        ListenerHandle {
            id,
            event_type,
            scope,
        }
    }

    /// Remove a registration; `false` if it was already gone
    pub fn unregister(&self, handle: &ListenerHandle) -> bool {
        let key = (handle.event_type, handle.scope);
        let removed = match self.listeners.get_mut(&key) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|(id, _)| *id != handle.id);
                before != list.len()
            }
            None => false,
        };
        self.listeners.remove_if(&key, |_, list| list.is_empty());
        removed
    }

    /// Callbacks interested in `event`, in invocation order
    pub fn listeners_for(&self, event: &Event) -> Vec<Listener> {
        let event_type = event.event_type();
        let mut out = Vec::new();

        let scopes = std::iter::once(Scope::Global).chain(event.scopes());
        for scope in scopes {
            if let Some(list) = self.listeners.get(&(event_type, scope)) {
                out.extend(list.iter().map(|(_, l)| l.clone()));
            }
        }
        out
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.listeners.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("registrations", &self.len())
            .finish()
    }
}
