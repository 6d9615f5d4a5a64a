//! Persistence layer: users, conversations, membership, and message history.
//!
//! The hub talks to storage only through [`ChatStore`]; the auth layer only
//! through [`UserStore`]. Two implementations exist: [`PostgresStore`] over
//! `sqlx::PgPool`, and [`MemoryStore`] for single-process development and
//! tests.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::{ChatMessage, ConversationId, UserId};
use crate::error::ChatError;

pub use memory::MemoryStore;
pub use models::{ConversationKind, StoredMessage, UserRecord, UserSummary};
pub use postgres::PostgresStore;

/// Durable record of conversations, their members, and their messages.
#[async_trait]
pub trait ChatStore: Send + Sync + std::fmt::Debug {
    /// Durably records `message` against its conversation and returns the
    /// new message id.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] if the conversation or the sender does
    /// not exist, or [`ChatError::Persistence`] on storage failure.
    async fn save_message(&self, message: &ChatMessage) -> Result<i64, ChatError>;

    /// Returns the ids of every participant in `conversation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    async fn conversation_members(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<UserId>, ChatError>;

    /// Returns the latest `limit` messages of a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    async fn history(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, ChatError>;

    /// Finds the private conversation between two users, creating it if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] if any participant is not a registered
    /// user, or [`ChatError::Persistence`] on storage failure.
    async fn create_private_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<ConversationId, ChatError>;

    /// Creates a new group conversation containing `creator` and `members`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] if any participant is not a registered
    /// user, or [`ChatError::Persistence`] on storage failure.
    async fn create_group_conversation(
        &self,
        creator: UserId,
        members: &[UserId],
    ) -> Result<ConversationId, ChatError>;

    /// Returns `true` if `user` participates in `conversation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    async fn is_member(
        &self,
        conversation_id: ConversationId,
        user: UserId,
    ) -> Result<bool, ChatError>;
}

/// Registered user accounts.
#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Inserts a new user.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Conflict`] if the username is taken and
    /// [`ChatError::Persistence`] on storage failure.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, ChatError>;

    /// Looks a user up by exact username.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, ChatError>;

    /// Case-insensitive substring search over usernames.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserSummary>, ChatError>;
}

/// Deduplicated member list for a new group: creator first, then the
/// requested members in order of first appearance.
pub(crate) const UNKNOWN_USERS: &str = "one or more users do not exist";
pub(crate) const UNKNOWN_MESSAGE_TARGET: &str = "conversation or sender does not exist";

pub(crate) fn group_members(creator: UserId, members: &[UserId]) -> Vec<UserId> {
    let mut all = Vec::with_capacity(members.len().saturating_add(1));
    all.push(creator);
    for member in members {
        if !all.contains(member) {
            all.push(*member);
        }
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_members_dedups_and_keeps_creator_first() {
        let members = group_members(
            UserId::new(1),
            &[UserId::new(2), UserId::new(1), UserId::new(3), UserId::new(2)],
        );
        assert_eq!(members, vec![UserId::new(1), UserId::new(2), UserId::new(3)]);
    }
}
