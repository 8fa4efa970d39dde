//! # confab-store
//!
//! Durable state for the Confab chat server, on SQLite via `sqlx`.
//!
//! The store owns the schema and all SQL. It covers four tables:
//!
//! - `users` - accounts, owned by the external account system; read-only here
//! - `friend_requests` - the social graph, read-only here
//! - `rooms` - one row per friend pair, created lazily on first authorized
//!   contact
//! - `messages` - the permanent chat history
//!
//! Methods are grouped by table in the sibling modules; all of them hang off
//! the one [`Store`] handle, which is cheap to clone.

pub mod error;
pub mod friends;
pub mod messages;
pub mod rooms;
pub mod users;

pub use error::StoreError;
pub use friends::FriendshipStatus;
pub use messages::StoredMessage;
pub use rooms::RoomRecord;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

/// Startup schema. `messages.id` is AUTOINCREMENT so ordering keys are
/// monotonic and never reused; `rooms` is unique per ordered pair so
/// concurrent first contact collapses to one row.
const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    is_active   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS friend_requests (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id    INTEGER NOT NULL REFERENCES users(id),
    recipient_id INTEGER NOT NULL REFERENCES users(id),
    status       TEXT NOT NULL DEFAULT 'pending',
    created_at   TEXT NOT NULL,
    UNIQUE(sender_id, recipient_id)
);

CREATE TABLE IF NOT EXISTS rooms (
    key         TEXT PRIMARY KEY,
    user_low    INTEGER NOT NULL REFERENCES users(id),
    user_high   INTEGER NOT NULL REFERENCES users(id),
    created_at  TEXT NOT NULL,
    UNIQUE(user_low, user_high)
);

CREATE TABLE IF NOT EXISTS messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    room_key     TEXT NOT NULL REFERENCES rooms(key),
    sender_id    INTEGER NOT NULL REFERENCES users(id),
    recipient_id INTEGER NOT NULL REFERENCES users(id),
    body         TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    is_read      INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_room_order
    ON messages(room_key, created_at, id);
"#;

/// Handle to the durable store.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to the database and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(url = %url, "Store connected");
        Ok(store)
    }

    /// Open an in-memory database, for tests and local experiments.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // A single connection so every query sees the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Access the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(INIT_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::Store;
    use confab_core::now_rfc3339;

    pub async fn seed_user(store: &Store, id: i64, username: &str, active: bool) {
        sqlx::query("INSERT INTO users (id, username, is_active) VALUES (?, ?, ?)")
            .bind(id)
            .bind(username)
            .bind(active)
            .execute(store.pool())
            .await
            .unwrap();
    }

    pub async fn seed_friendship(store: &Store, sender: i64, recipient: i64, status: &str) {
        sqlx::query(
            "INSERT INTO friend_requests (sender_id, recipient_id, status, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(sender)
        .bind(recipient)
        .bind(status)
        .bind(now_rfc3339())
        .execute(store.pool())
        .await
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_covers_all_tables() {
        for table in ["users", "friend_requests", "rooms", "messages"] {
            assert!(INIT_SQL.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
    }

    #[tokio::test]
    async fn test_in_memory_schema_is_created() {
        let store = Store::in_memory().await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
