//! Entities - snapshots of platform objects as last reported by the gateway

mod channel;
mod message;
mod role;
mod server;
mod user;

pub use channel::{Channel, ChannelType};
pub use message::{Attachment, Message};
pub use role::Role;
pub use server::Server;
pub use user::User;
