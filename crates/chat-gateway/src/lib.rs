//! # chat-gateway
//!
//! Gateway side of the client: the socket session, the packet decoder, the
//! handlers that keep the entity cache current, and the queue that delivers
//! the resulting events to listeners.

pub mod connection;
pub mod error;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod queue;

pub use connection::{GatewaySession, SessionHandle, SessionState};
pub use error::GatewayError;
pub use events::{Change, Event, EventType, Listener, ListenerHandle, ListenerRegistry, OrderingKey, Scope};
pub use handlers::PacketDispatcher;
pub use queue::{ErrorHook, EventQueue, FailureCause, ListenerFailure};
