//! Database models for users, conversations, and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ConversationId, UserId};

/// A stored row from the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Primary key.
    pub id: UserId,
    /// Unique login name, also the display name.
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Public projection of a user for search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    /// Primary key.
    pub id: UserId,
    /// Display name.
    pub username: String,
}

impl From<&UserRecord> for UserSummary {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
        }
    }
}

/// Conversation flavour, stored as `private` or `group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// Exactly two participants, found-or-created on demand.
    Private,
    /// Any number of participants, always created fresh.
    Group,
}

impl ConversationKind {
    /// Column value for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

/// A stored row from the `messages` table joined with its sender's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredMessage {
    /// Primary key.
    pub id: i64,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Sender.
    pub sender_id: UserId,
    /// Sender display name (joined from `users`).
    pub username: String,
    /// Message text.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
