//! Conversation service: creation, membership checks, and history.

use std::sync::Arc;

use crate::domain::{ConversationId, UserId};
use crate::error::ChatError;
use crate::persistence::{ChatStore, StoredMessage};

/// Conversation operations over a [`ChatStore`].
#[derive(Debug, Clone)]
pub struct ConversationService {
    store: Arc<dyn ChatStore>,
    history_limit: u32,
}

impl ConversationService {
    /// Creates a service whose history pages hold at most `history_limit`
    /// messages.
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, history_limit: u32) -> Self {
        Self {
            store,
            history_limit: history_limit.max(1),
        }
    }

    /// Default and maximum history page size.
    #[must_use]
    pub const fn history_limit(&self) -> u32 {
        self.history_limit
    }

    /// Finds or creates the private conversation between `caller` and
    /// `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidRequest`] if `target` is the caller.
    pub async fn start_private(
        &self,
        caller: UserId,
        target: UserId,
    ) -> Result<ConversationId, ChatError> {
        if caller == target {
            return Err(ChatError::InvalidRequest(
                "cannot start a conversation with yourself".to_string(),
            ));
        }
        let id = self.store.create_private_conversation(caller, target).await?;
        tracing::debug!(conversation_id = %id, %caller, %target, "private conversation ready");
        Ok(id)
    }

    /// Creates a group conversation of `creator` and `members`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidRequest`] if no member other than the
    /// creator is listed.
    pub async fn create_group(
        &self,
        creator: UserId,
        members: &[UserId],
    ) -> Result<ConversationId, ChatError> {
        if members.iter().all(|m| *m == creator) {
            return Err(ChatError::InvalidRequest(
                "a group needs at least one other member".to_string(),
            ));
        }
        let id = self.store.create_group_conversation(creator, members).await?;
        tracing::info!(
            conversation_id = %id,
            %creator,
            members = members.len(),
            "group conversation created"
        );
        Ok(id)
    }

    /// Returns the latest messages of a conversation, oldest first.
    ///
    /// `limit` defaults to and is clamped by the configured history limit.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Forbidden`] if `caller` is not a member.
    pub async fn history(
        &self,
        caller: UserId,
        conversation_id: ConversationId,
        limit: Option<u32>,
    ) -> Result<Vec<StoredMessage>, ChatError> {
        if !self.store.is_member(conversation_id, caller).await? {
            return Err(ChatError::Forbidden(format!(
                "not a member of conversation {conversation_id}"
            )));
        }
        let limit = limit
            .unwrap_or(self.history_limit)
            .clamp(1, self.history_limit);
        self.store.history(conversation_id, limit).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ChatMessage, Identity};
    use crate::persistence::{MemoryStore, UserStore};

    async fn service(limit: u32) -> (ConversationService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for name in ["alice", "bob", "carol"] {
            let Ok(_) = store.create_user(name, "hash").await else {
                panic!("seeding {name} failed");
            };
        }
        (
            ConversationService::new(Arc::clone(&store) as Arc<dyn ChatStore>, limit),
            store,
        )
    }

    #[tokio::test]
    async fn private_conversation_rejects_self() {
        let (conversations, _) = service(50).await;
        assert!(matches!(
            conversations.start_private(UserId::new(1), UserId::new(1)).await,
            Err(ChatError::InvalidRequest(_))
        ));
        let (Ok(a), Ok(b)) = (
            conversations.start_private(UserId::new(1), UserId::new(2)).await,
            conversations.start_private(UserId::new(2), UserId::new(1)).await,
        ) else {
            panic!("private conversation should be created");
        };
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn group_needs_another_member() {
        let (conversations, _) = service(50).await;
        assert!(conversations.create_group(UserId::new(1), &[]).await.is_err());
        assert!(
            conversations
                .create_group(UserId::new(1), &[UserId::new(1)])
                .await
                .is_err()
        );
        assert!(
            conversations
                .create_group(UserId::new(1), &[UserId::new(2), UserId::new(3)])
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn history_is_members_only_and_clamped() {
        let (conversations, store) = service(3).await;
        let Ok(id) = conversations.start_private(UserId::new(1), UserId::new(2)).await else {
            panic!("create failed");
        };
        for i in 0..5 {
            let message =
                ChatMessage::new(Identity::new(UserId::new(1), "alice"), id, format!("m{i}"));
            let _ = store.save_message(&message).await;
        }

        assert!(matches!(
            conversations.history(UserId::new(3), id, None).await,
            Err(ChatError::Forbidden(_))
        ));

        let Ok(page) = conversations.history(UserId::new(2), id, Some(100)).await else {
            panic!("history failed");
        };
        let contents: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);

        let Ok(page) = conversations.history(UserId::new(2), id, Some(0)).await else {
            panic!("history failed");
        };
        assert_eq!(page.len(), 1);
    }
}
