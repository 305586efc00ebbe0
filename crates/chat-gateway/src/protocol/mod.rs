//! Gateway protocol definitions
//!
//! Op codes, message envelope, payloads, close codes, and the packet decoder.

mod close_codes;
mod decoder;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{classify, CloseAction, CloseCode};
pub use decoder::{decode, decode_bytes};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload, ReadyPayload,
    ResumePayload, UnavailableServer,
};
