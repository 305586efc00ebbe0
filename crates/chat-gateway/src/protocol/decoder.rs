//! Packet decoder
//!
//! Turns a raw frame into a [`GatewayMessage`]. Decoding is pure; callers
//! log and drop frames that fail with `MalformedPacket`.

use chat_common::{ClientError, ClientResult};

use super::GatewayMessage;

/// Decode a text frame
pub fn decode(frame: &str) -> ClientResult<GatewayMessage> {
    GatewayMessage::from_json(frame)
        .map_err(|e| ClientError::malformed(format!("{e} in frame {}", preview(frame))))
}

/// Decode a binary frame holding UTF-8 JSON
pub fn decode_bytes(frame: &[u8]) -> ClientResult<GatewayMessage> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| ClientError::malformed(format!("binary frame is not UTF-8: {e}")))?;
    decode(text)
}

fn preview(frame: &str) -> String {
    const MAX: usize = 120;
    if frame.len() <= MAX {
        return format!("{frame:?}");
    }
    let mut end = MAX;
    while !frame.is_char_boundary(end) {
        end -= 1;
    }
    format!("{:?}...", &frame[..end])
}
