//! Account lookups.
//!
//! Accounts are owned by the external account system; the chat core only
//! confirms that a claimed identity still resolves to a live account.

use crate::{Store, StoreError};
use confab_core::{UserId, UserIdentity};

impl Store {
    /// Resolve a user id to its identity, if the account exists and is
    /// active.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub async fn active_user(&self, id: UserId) -> Result<Option<UserIdentity>, StoreError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, username FROM users WHERE id = ? AND is_active = 1")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;

        Ok(row.map(|(id, username)| UserIdentity::new(id, username)))
    }
}
