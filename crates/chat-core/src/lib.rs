//! # chat-core
//!
//! Platform data model: snowflake ids, permission and intent flags, and the
//! entity snapshots held by the client cache.
//! This crate has no dependencies on the network layers.

pub mod entities;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Attachment, Channel, ChannelType, Message, Role, Server, User};
pub use value_objects::{Intents, Permissions, Snowflake, SnowflakeParseError};
