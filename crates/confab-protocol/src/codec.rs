//! Codec for encoding and decoding Confab frames.
//!
//! Frames travel as JSON text, one frame per WebSocket message. There is no
//! length prefixing; the transport already delimits messages.

use thiserror::Error;

use crate::frames::{ClientFrame, ServerFrame};

/// Maximum inbound frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a server frame to its JSON text form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(frame: &ServerFrame) -> Result<String, ProtocolError> {
    serde_json::to_string(frame).map_err(ProtocolError::Encode)
}

/// Decode an inbound client frame from raw message bytes.
///
/// # Errors
///
/// Returns an error if the data is oversized or is not a JSON object of the
/// expected shape. Callers treat any error as a malformed frame and drop it.
pub fn decode(data: &[u8]) -> Result<ClientFrame, ProtocolError> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }

    serde_json::from_slice(data).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_server_frames() {
        let frames = vec![
            ServerFrame::connection_established(),
            ServerFrame::not_friends(),
            ServerFrame::message("hey", 1, "alice", "2026-01-01T00:00:00Z"),
        ];

        for frame in frames {
            let encoded = encode(&frame).unwrap();
            let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
            assert!(value.get("type").is_some());
            assert!(value.get("message").is_some());
        }
    }

    #[test]
    fn test_decode_client_frame() {
        let frame = decode(br#"{"message": "hello"}"#).unwrap();
        assert_eq!(frame.message, "hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"not json at all").is_err());
        assert!(decode(b"[1, 2, 3]").is_err());
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let huge = vec![b'a'; MAX_FRAME_SIZE + 1];
        match decode(&huge) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }
}
