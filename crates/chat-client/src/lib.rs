//! # chat-client
//!
//! Typed client for the chat platform: a gateway session that keeps an
//! in-memory entity cache current, typed events delivered to scoped
//! listeners, and a rate limited REST executor.
//!
//! ## Example
//!
//! ```ignore
//! use chat_client::{Client, ClientConfig, EventType, Listener, Scope};
//!
//! let client = Client::builder(ClientConfig::from_env()?).build()?;
//! client.register_listener(
//!     EventType::MessageCreate,
//!     Scope::Global,
//!     Listener::sync(|event| {
//!         tracing::info!(?event, "message");
//!         Ok(())
//!     }),
//! );
//! client.connect()?;
//! client.wait().await?;
//! ```

mod builder;
mod client;

pub use builder::ClientBuilder;
pub use client::Client;

pub use chat_cache::{CachedEntity, EntityCache, EntityKind};
pub use chat_common::{ClientConfig, ClientError, ClientResult, ErrorKind};
pub use chat_core::{Channel, Message, Role, Server, Snowflake, User};
pub use chat_gateway::{
    Change, ErrorHook, Event, EventType, FailureCause, Listener, ListenerFailure, ListenerHandle, OrderingKey,
    Scope, SessionState,
};
pub use chat_gateway::protocol::PresenceUpdatePayload;
pub use chat_rest::{Endpoint, FileAttachment, Method, RestRequest, RestResponse};
