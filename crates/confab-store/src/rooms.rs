//! Durable room records.
//!
//! A room row exists for every friend pair that has ever had authorized
//! contact. Creation is lazy and race-safe: two sessions resolving the same
//! pair at once collapse to a single row.

use crate::{Store, StoreError};
use confab_core::{now_rfc3339, ordered_pair, room_id, RoomId, UserId};

/// A persisted room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    /// Canonical key, `chat_{low}_{high}`.
    pub key: RoomId,
    /// Lower user id of the pair.
    pub user_low: UserId,
    /// Higher user id of the pair.
    pub user_high: UserId,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

impl Store {
    /// Resolve the unordered pair to its room, creating the row on first
    /// contact.
    ///
    /// The insert is `ON CONFLICT DO NOTHING`, so concurrent first contact
    /// from both participants yields exactly one row; the loser of the race
    /// reads the winner's row.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn get_or_create_room(&self, a: UserId, b: UserId) -> Result<RoomRecord, StoreError> {
        let (low, high) = ordered_pair(a, b);
        let key = room_id(a, b);

        sqlx::query(
            "INSERT INTO rooms (key, user_low, user_high, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(&key)
        .bind(low)
        .bind(high)
        .bind(now_rfc3339())
        .execute(self.pool())
        .await?;

        let (key, user_low, user_high, created_at): (String, i64, i64, String) =
            sqlx::query_as("SELECT key, user_low, user_high, created_at FROM rooms WHERE key = ?")
                .bind(&key)
                .fetch_one(self.pool())
                .await?;

        Ok(RoomRecord {
            key,
            user_low,
            user_high,
            created_at,
        })
    }

    /// Number of persisted rooms.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn room_count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rooms")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_user;

    async fn store_with_users() -> Store {
        let store = Store::in_memory().await.unwrap();
        seed_user(&store, 1, "alice", true).await;
        seed_user(&store, 2, "bob", true).await;
        store
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent_and_symmetric() {
        let store = store_with_users().await;

        let first = store.get_or_create_room(2, 1).await.unwrap();
        let second = store.get_or_create_room(1, 2).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.key, "chat_1_2");
        assert_eq!((first.user_low, first.user_high), (1, 2));
        assert_eq!(store.room_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_contact_creates_one_room() {
        let store = store_with_users().await;

        let (a, b) = tokio::join!(
            store.get_or_create_room(1, 2),
            store.get_or_create_room(2, 1),
        );

        assert_eq!(a.unwrap().key, b.unwrap().key);
        assert_eq!(store.room_count().await.unwrap(), 1);
    }
}
