//! User service: registration, login, and search.

use std::sync::Arc;

use crate::auth::{JwtService, hash_password, verify_password};
use crate::domain::Identity;
use crate::error::ChatError;
use crate::persistence::{UserStore, UserSummary};

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LEN: usize = 50;

/// Maximum number of results returned by [`UserService::search`].
pub const SEARCH_LIMIT: u32 = 10;

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Signed access token.
    pub access_token: String,
    /// The authenticated user.
    pub user: UserSummary,
}

/// Account operations over a [`UserStore`].
///
/// Password hashing is CPU-heavy and runs on the blocking pool so it never
/// stalls the async workers.
#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    jwt: Arc<JwtService>,
}

impl UserService {
    /// Creates a new `UserService`.
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, jwt: Arc<JwtService>) -> Self {
        Self { store, jwt }
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidRequest`] for an empty or overlong
    /// username or an empty password, and [`ChatError::Conflict`] if the
    /// username is taken.
    pub async fn register(&self, username: &str, password: &str) -> Result<UserSummary, ChatError> {
        let username = username.trim();
        if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
            return Err(ChatError::InvalidRequest(format!(
                "username must be 1 to {MAX_USERNAME_LEN} characters"
            )));
        }
        if password.is_empty() {
            return Err(ChatError::InvalidRequest("password must not be empty".to_string()));
        }

        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))??;

        let record = self.store.create_user(username, &hash).await?;
        tracing::info!(user_id = %record.id, username = %record.username, "user registered");
        Ok(UserSummary::from(&record))
    }

    /// Verifies credentials and issues an access token.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Unauthorized`] if the user does not exist or the
    /// password does not match.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ChatError> {
        let invalid = || ChatError::Unauthorized("invalid username or password".to_string());

        let record = self
            .store
            .find_user_by_username(username.trim())
            .await?
            .ok_or_else(invalid)?;

        let password = password.to_string();
        let stored = record.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))??;
        if !matches {
            return Err(invalid());
        }

        let access_token = self
            .jwt
            .issue(&Identity::new(record.id, record.username.clone()))?;
        tracing::debug!(user_id = %record.id, "login succeeded");
        Ok(LoginOutcome {
            access_token,
            user: UserSummary::from(&record),
        })
    }

    /// Case-insensitive username search, at most [`SEARCH_LIMIT`] results.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidRequest`] for an empty query.
    pub async fn search(&self, query: &str) -> Result<Vec<UserSummary>, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::InvalidRequest("query must not be empty".to_string()));
        }
        self.store.search_users(query, SEARCH_LIMIT).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::TokenValidator;
    use crate::persistence::MemoryStore;

    fn service() -> (UserService, Arc<JwtService>) {
        let jwt = Arc::new(JwtService::new("test-secret", 1));
        (
            UserService::new(Arc::new(MemoryStore::new()), Arc::clone(&jwt)),
            jwt,
        )
    }

    #[tokio::test]
    async fn register_then_login() {
        let (users, jwt) = service();
        let Ok(alice) = users.register("alice", "pw").await else {
            panic!("registration failed");
        };
        assert_eq!(alice.username, "alice");

        let Ok(outcome) = users.login("alice", "pw").await else {
            panic!("login failed");
        };
        assert_eq!(outcome.user, alice);
        let Ok(identity) = jwt.validate_token(&outcome.access_token) else {
            panic!("issued token should validate");
        };
        assert_eq!(identity.user_id, alice.id);
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let (users, _) = service();
        let _ = users.register("alice", "pw").await;

        assert!(matches!(
            users.login("alice", "wrong").await,
            Err(ChatError::Unauthorized(_))
        ));
        assert!(matches!(
            users.login("nobody", "pw").await,
            Err(ChatError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn registration_is_validated() {
        let (users, _) = service();
        assert!(matches!(
            users.register("  ", "pw").await,
            Err(ChatError::InvalidRequest(_))
        ));
        assert!(matches!(
            users.register(&"x".repeat(MAX_USERNAME_LEN + 1), "pw").await,
            Err(ChatError::InvalidRequest(_))
        ));
        assert!(matches!(
            users.register("alice", "").await,
            Err(ChatError::InvalidRequest(_))
        ));
        assert!(users.register("alice", "pw").await.is_ok());
        assert!(matches!(
            users.register("alice", "pw").await,
            Err(ChatError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn search_requires_a_query() {
        let (users, _) = service();
        let _ = users.register("alice", "pw").await;
        assert!(users.search("").await.is_err());
        let Ok(found) = users.search("ALI").await else {
            panic!("search failed");
        };
        assert_eq!(found.len(), 1);
    }
}
