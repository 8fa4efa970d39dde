//! Store error types.

use thiserror::Error;

/// Errors from the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The message body is empty after trimming. Non-fatal; the session
    /// silently drops the send.
    #[error("Empty message body")]
    EmptyMessage,

    /// Underlying database failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether this failure is the silent empty-body rejection.
    #[must_use]
    pub fn is_empty_message(&self) -> bool {
        matches!(self, Self::EmptyMessage)
    }
}
