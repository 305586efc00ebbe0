//! Typed events and listener registration

mod event;
mod event_types;
mod registry;
mod scope;

pub use event::{Change, Event, EventType};
pub use event_types::PacketType;
pub use registry::{Listener, ListenerHandle, ListenerRegistry};
pub use scope::{OrderingKey, Scope};
