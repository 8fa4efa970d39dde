//! Message persistence and history.
//!
//! Messages are immutable once written (only the read flag may ever
//! change). The per-room total order is `(created_at, id)`: the id column is
//! AUTOINCREMENT, so ties on the wall-clock timestamp are broken by
//! insertion order and ordering keys are never reused.

use crate::{Store, StoreError};
use confab_core::{now_rfc3339, RoomId, UserIdentity};
use serde::Serialize;
use tracing::debug;

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMessage {
    /// Ordering key within the room.
    pub id: i64,
    /// Room the message belongs to.
    #[serde(skip)]
    pub room: RoomId,
    /// The sending user.
    pub sender: UserIdentity,
    /// The receiving user.
    pub recipient: UserIdentity,
    /// The chat text.
    #[serde(rename = "text")]
    pub body: String,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Whether the recipient has read the message.
    pub is_read: bool,
}

impl Store {
    /// Durably record a sent message.
    ///
    /// The body is trimmed before storage, matching what the sender's peers
    /// will see broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyMessage`] if the body is empty or
    /// whitespace-only (no row is written), or a database error.
    pub async fn append_message(
        &self,
        room: &str,
        sender: &UserIdentity,
        recipient: &UserIdentity,
        body: &str,
    ) -> Result<StoredMessage, StoreError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(StoreError::EmptyMessage);
        }

        let created_at = now_rfc3339();
        let result = sqlx::query(
            "INSERT INTO messages (room_key, sender_id, recipient_id, body, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(room)
        .bind(sender.id)
        .bind(recipient.id)
        .bind(body)
        .bind(&created_at)
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        debug!(room = %room, sender = %sender.id, message = id, "Message persisted");

        Ok(StoredMessage {
            id,
            room: room.to_string(),
            sender: sender.clone(),
            recipient: recipient.clone(),
            body: body.to_string(),
            created_at,
            is_read: false,
        })
    }

    /// All messages of a room in ascending creation order.
    ///
    /// A point-in-time snapshot, not a stream.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn history(&self, room: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let rows: Vec<(i64, i64, String, i64, String, String, String, bool)> = sqlx::query_as(
            "SELECT m.id, m.sender_id, su.username, m.recipient_id, ru.username,
                    m.body, m.created_at, m.is_read
             FROM messages m
             JOIN users su ON su.id = m.sender_id
             JOIN users ru ON ru.id = m.recipient_id
             WHERE m.room_key = ?
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .bind(room)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, sender_id, sender_name, recipient_id, recipient_name, body, created_at, is_read)| {
                    StoredMessage {
                        id,
                        room: room.to_string(),
                        sender: UserIdentity::new(sender_id, sender_name),
                        recipient: UserIdentity::new(recipient_id, recipient_name),
                        body,
                        created_at,
                        is_read,
                    }
                },
            )
            .collect())
    }
}
