//! Verified caller identity.

use serde::{Deserialize, Serialize};

use super::UserId;

/// A `(user id, display name)` pair produced by the token validator.
///
/// Built once per request by the auth layer and passed by value into the
/// session; the hub trusts it without re-validating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
    /// Display name shown to other participants.
    pub username: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}
