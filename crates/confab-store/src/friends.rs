//! Friendship queries.
//!
//! The social graph is owned by the external friends collaborator; this
//! module is the read-only authorization guard over it. The relation is
//! symmetric, so every query checks both orientations of the pair.

use crate::{Store, StoreError};
use confab_core::UserId;

/// Ternary friendship state between an unordered pair of users.
///
/// A `rejected` row counts as [`FriendshipStatus::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipStatus {
    /// No relationship, or a rejected request.
    None,
    /// A request exists but has not been accepted.
    Pending,
    /// The users are friends.
    Accepted,
}

impl Store {
    /// Whether two users are currently friends.
    ///
    /// This is the authorization guard for joining a room. It is evaluated
    /// once at connection-join time, not per message.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn is_connected(&self, a: UserId, b: UserId) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                 SELECT 1 FROM friend_requests
                 WHERE ((sender_id = ? AND recipient_id = ?)
                     OR (sender_id = ? AND recipient_id = ?))
                   AND status = 'accepted'
             )",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    /// The full ternary friendship status of an unordered pair.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn friendship_status(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<FriendshipStatus, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT status FROM friend_requests
             WHERE (sender_id = ? AND recipient_id = ?)
                OR (sender_id = ? AND recipient_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(self.pool())
        .await?;

        let mut status = FriendshipStatus::None;
        for (row,) in rows {
            match row.as_str() {
                "accepted" => return Ok(FriendshipStatus::Accepted),
                "pending" => status = FriendshipStatus::Pending,
                _ => {}
            }
        }
        Ok(status)
    }
}
