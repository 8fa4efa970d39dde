//! Frame types for the Confab wire protocol.
//!
//! Frames are JSON objects carried as WebSocket text messages. The client
//! vocabulary is a single frame shape; everything the server pushes is
//! tagged by a `type` field.

use serde::{Deserialize, Serialize};

/// Greeting text sent with [`ServerFrame::ConnectionEstablished`].
pub const CONNECTED_MESSAGE: &str = "Connected to chat";

/// Reason text sent when the two users are not friends.
pub const NOT_FRIENDS_MESSAGE: &str = "You can only chat with friends";

/// An inbound frame from the client.
///
/// Only the `message` field is defined; unknown fields are ignored and a
/// missing `message` decodes as empty (which the session then discards).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientFrame {
    /// The chat text to send.
    #[serde(default)]
    pub message: String,
}

/// An outbound frame from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent exactly once, immediately after a successful room join.
    ConnectionEstablished {
        /// Fixed greeting text.
        message: String,
    },

    /// Sent when authorization fails, immediately before the close.
    Error {
        /// Human-readable reason.
        message: String,
    },

    /// One broadcast chat event, delivered to every subscriber of the room
    /// including the sender.
    Message {
        /// The chat text.
        message: String,
        /// Identity of the sending user.
        sender_id: i64,
        /// Display name of the sending user.
        sender_username: String,
        /// ISO-8601 timestamp of the send.
        timestamp: String,
    },
}

impl ServerFrame {
    /// Create the post-join greeting frame.
    #[must_use]
    pub fn connection_established() -> Self {
        Self::ConnectionEstablished {
            message: CONNECTED_MESSAGE.to_string(),
        }
    }

    /// Create an error frame with the given reason.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Create the not-friends authorization failure frame.
    #[must_use]
    pub fn not_friends() -> Self {
        Self::error(NOT_FRIENDS_MESSAGE)
    }

    /// Create a chat message frame.
    #[must_use]
    pub fn message(
        message: impl Into<String>,
        sender_id: i64,
        sender_username: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self::Message {
            message: message.into(),
            sender_id,
            sender_username: sender_username.into(),
            timestamp: timestamp.into(),
        }
    }
}
