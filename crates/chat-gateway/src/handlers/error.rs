//! Handler error types

use chat_common::ClientError;
use thiserror::Error;

use crate::events::PacketType;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// The dispatch payload did not match the packet's shape
    #[error("Invalid {packet} payload: {source}")]
    InvalidPayload {
        packet: PacketType,
        #[source]
        source: serde_json::Error,
    },

    /// Dispatch without a `d` field
    #[error("{0} dispatch has no payload")]
    MissingPayload(PacketType),
}

impl From<HandlerError> for ClientError {
    fn from(err: HandlerError) -> Self {
        ClientError::malformed(err)
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;
