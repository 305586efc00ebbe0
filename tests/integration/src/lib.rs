//! Integration test utilities for the chat client
//!
//! In-process mock gateway and mock REST servers, plus JSON payload builders
//! for driving a real [`chat_client::Client`] end to end.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
