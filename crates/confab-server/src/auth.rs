//! Bearer-token verification.
//!
//! Clients present a signed access token at connection time (query
//! parameter on the WebSocket handshake, bearer header on HTTP). The
//! verifier decodes and validates the signature and expiry, then confirms
//! the claimed account still exists and is active.
//!
//! Every failure mode - malformed token, bad signature, expiry, unknown or
//! inactive account - collapses to [`AuthError::InvalidToken`]; the
//! connection is closed without leaking which check failed.

use axum::http::{header, HeaderMap};
use confab_core::{UserId, UserIdentity};
use confab_store::Store;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token did not resolve to an active account.
    #[error("Invalid token")]
    InvalidToken,
}

/// Access-token claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated account.
    pub user_id: UserId,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Validates access tokens and resolves them to user identities.
pub struct TokenVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier for HS256 tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and resolve the claimed identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] on any failure; details go to
    /// the log, never to the peer.
    pub async fn verify(&self, token: &str, store: &Store) -> Result<UserIdentity, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                AuthError::InvalidToken
            })?
            .claims;

        match store.active_user(claims.user_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                debug!(user = claims.user_id, "Token claims unknown or inactive account");
                Err(AuthError::InvalidToken)
            }
            Err(e) => {
                debug!(error = %e, "Account lookup failed during token verification");
                Err(AuthError::InvalidToken)
            }
        }
    }
}

/// Extract a bearer token from an `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-secret";

    fn mint(secret: &str, user_id: i64, expires_in_secs: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = Claims {
            user_id,
            exp: (now + expires_in_secs).max(0) as u64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    async fn store_with_user(id: i64, username: &str, active: bool) -> Store {
        let store = Store::in_memory().await.unwrap();
        sqlx::query("INSERT INTO users (id, username, is_active) VALUES (?, ?, ?)")
            .bind(id)
            .bind(username)
            .bind(active)
            .execute(store.pool())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_valid_token_resolves_identity() {
        let store = store_with_user(7, "alice", true).await;
        let verifier = TokenVerifier::new(SECRET, 0);

        let user = verifier.verify(&mint(SECRET, 7, 3600), &store).await.unwrap();
        assert_eq!(user, UserIdentity::new(7, "alice"));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let store = store_with_user(7, "alice", true).await;
        let verifier = TokenVerifier::new(SECRET, 0);

        let result = verifier.verify(&mint(SECRET, 7, -3600), &store).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_wrong_signature_is_rejected() {
        let store = store_with_user(7, "alice", true).await;
        let verifier = TokenVerifier::new(SECRET, 0);

        let result = verifier.verify(&mint("other-secret", 7, 3600), &store).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let store = store_with_user(7, "alice", true).await;
        let verifier = TokenVerifier::new(SECRET, 0);

        let result = verifier.verify("definitely.not.a.token", &store).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_token_for_unknown_account_is_rejected() {
        let store = store_with_user(7, "alice", true).await;
        let verifier = TokenVerifier::new(SECRET, 0);

        let result = verifier.verify(&mint(SECRET, 99, 3600), &store).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_token_for_inactive_account_is_rejected() {
        let store = store_with_user(7, "alice", false).await;
        let verifier = TokenVerifier::new(SECRET, 0);

        let result = verifier.verify(&mint(SECRET, 7, 3600), &store).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&basic), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
