//! Type-safe identifiers.
//!
//! [`UserId`] and [`ConversationId`] wrap the store's integer keys;
//! [`SessionId`] wraps a UUID v4 minted per live connection. The newtypes
//! keep the three from being confused at call sites.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier of a registered user (store primary key).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wraps a raw store key.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a conversation (store primary key).
///
/// The value `0` is reserved for server-wide announcements, which belong to
/// no stored conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct ConversationId(i64);

impl ConversationId {
    /// Pseudo-conversation used for announcements.
    pub const ANNOUNCEMENTS: Self = Self(0);

    /// Wraps a raw store key.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier of one live connection.
///
/// Wraps a UUID v4 generated when the transport is upgraded. A user that
/// connects twice gets two distinct session ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Creates a new random `SessionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn numeric_ids_serialize_as_plain_integers() {
        let Ok(json) = serde_json::to_string(&ConversationId::new(7)) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "7");

        let Ok(user) = serde_json::from_str::<UserId>("42") else {
            panic!("deserialization failed");
        };
        assert_eq!(user.get(), 42);
    }

    #[test]
    fn display_matches_raw_value() {
        assert_eq!(UserId::new(3).to_string(), "3");
        assert_eq!(ConversationId::ANNOUNCEMENTS.to_string(), "0");
    }
}
