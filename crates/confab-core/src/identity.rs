//! User identity types.
//!
//! Identities are owned by the external account system; this crate only
//! references them.

use serde::{Deserialize, Serialize};

/// A user's opaque numeric identifier.
pub type UserId = i64;

/// The resolved identity of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Account identifier.
    pub id: UserId,
    /// Display name.
    pub username: String,
}

impl UserIdentity {
    /// Create a new identity.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

impl std::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.username, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display() {
        let user = UserIdentity::new(42, "alice");
        assert_eq!(user.to_string(), "alice (42)");
    }
}
