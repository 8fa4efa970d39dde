//! Chat events fanned out through the bus.

use crate::identity::UserId;
use crate::room::RoomId;
use confab_protocol::ServerFrame;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// The current instant as an ISO-8601 (RFC 3339) UTC string.
#[must_use]
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap()
}

/// A chat message as broadcast to the subscribers of a room.
///
/// Events are created after the message has been durably written, so every
/// delivered event corresponds to a persisted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Room the event belongs to.
    pub room: RoomId,
    /// Identity of the sender.
    pub sender_id: UserId,
    /// Display name of the sender.
    pub sender_username: String,
    /// The chat text.
    pub body: String,
    /// ISO-8601 timestamp of the send.
    pub timestamp: String,
}

impl ChatEvent {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(
        room: impl Into<RoomId>,
        sender_id: UserId,
        sender_username: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            sender_id,
            sender_username: sender_username.into(),
            body: body.into(),
            timestamp: now_rfc3339(),
        }
    }

    /// Create an event carrying an existing timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// The wire frame delivered to each subscriber for this event.
    #[must_use]
    pub fn to_frame(&self) -> ServerFrame {
        ServerFrame::message(
            self.body.clone(),
            self.sender_id,
            self.sender_username.clone(),
            self.timestamp.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_to_frame() {
        let event = ChatEvent::new("chat_1_2", 1, "alice", "hello")
            .with_timestamp("2026-01-01T00:00:00Z");

        match event.to_frame() {
            ServerFrame::Message {
                message,
                sender_id,
                sender_username,
                timestamp,
            } => {
                assert_eq!(message, "hello");
                assert_eq!(sender_id, 1);
                assert_eq!(sender_username, "alice");
                assert_eq!(timestamp, "2026-01-01T00:00:00Z");
            }
            other => panic!("Expected Message frame, got {:?}", other),
        }
    }

    #[test]
    fn test_now_rfc3339_parses_back() {
        let stamp = now_rfc3339();
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok());
    }
}
