//! In-memory implementation of the persistence traits.
//!
//! Backs the relay when `PERSISTENCE_ENABLED=false` and every test that
//! needs a store. State lives behind a single [`tokio::sync::RwLock`]; the
//! failure switches let tests drive the hub's error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::models::{ConversationKind, StoredMessage, UserRecord, UserSummary};
use super::{ChatStore, UNKNOWN_MESSAGE_TARGET, UNKNOWN_USERS, UserStore, group_members};
use crate::domain::{ChatMessage, ConversationId, UserId};
use crate::error::ChatError;

#[derive(Debug)]
struct Conversation {
    kind: ConversationKind,
    members: Vec<UserId>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, UserRecord>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: Vec<StoredMessage>,
    last_user_id: i64,
    last_conversation_id: i64,
    last_message_id: i64,
}

impl Inner {
    fn ensure_users<'a>(&self, ids: impl IntoIterator<Item = &'a UserId>) -> Result<(), ChatError> {
        if ids.into_iter().all(|id| self.users.contains_key(id)) {
            Ok(())
        } else {
            Err(ChatError::NotFound(UNKNOWN_USERS.to_string()))
        }
    }

    fn next_conversation_id(&mut self) -> ConversationId {
        self.last_conversation_id = self.last_conversation_id.saturating_add(1);
        ConversationId::new(self.last_conversation_id)
    }
}

/// Process-local store with the same semantics as [`super::PostgresStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    fail_saves: AtomicBool,
    fail_membership: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save_message` fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `conversation_members` fail (or succeed again).
    pub fn fail_membership(&self, fail: bool) {
        self.fail_membership.store(fail, Ordering::SeqCst);
    }

    /// Seeds a conversation with a fixed id and member set.
    pub async fn insert_conversation(
        &self,
        id: ConversationId,
        kind: ConversationKind,
        members: &[UserId],
    ) {
        let mut inner = self.inner.write().await;
        inner.last_conversation_id = inner.last_conversation_id.max(id.get());
        inner.conversations.insert(
            id,
            Conversation {
                kind,
                members: members.to_vec(),
            },
        );
    }

    /// Seeds a user with a fixed id.
    pub async fn insert_user(&self, id: UserId, username: &str) {
        let mut inner = self.inner.write().await;
        inner.last_user_id = inner.last_user_id.max(id.get());
        inner.users.insert(
            id,
            UserRecord {
                id,
                username: username.to_string(),
                password_hash: String::new(),
                created_at: Utc::now(),
            },
        );
    }

    /// Returns every stored message in insertion order.
    pub async fn saved_messages(&self) -> Vec<StoredMessage> {
        self.inner.read().await.messages.clone()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<i64, ChatError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ChatError::Persistence("save rejected".to_string()));
        }
        let mut inner = self.inner.write().await;
        if !inner.conversations.contains_key(&message.conversation_id())
            || !inner.users.contains_key(&message.sender_id())
        {
            return Err(ChatError::NotFound(UNKNOWN_MESSAGE_TARGET.to_string()));
        }
        inner.last_message_id = inner.last_message_id.saturating_add(1);
        let id = inner.last_message_id;
        inner.messages.push(StoredMessage {
            id,
            conversation_id: message.conversation_id(),
            sender_id: message.sender_id(),
            username: message.sender().username.clone(),
            content: message.content().to_string(),
            created_at: message.created_at(),
        });
        Ok(id)
    }

    async fn conversation_members(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<UserId>, ChatError> {
        if self.fail_membership.load(Ordering::SeqCst) {
            return Err(ChatError::Persistence("membership lookup rejected".to_string()));
        }
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .get(&conversation_id)
            .map(|c| c.members.clone())
            .unwrap_or_default())
    }

    async fn history(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, ChatError> {
        let inner = self.inner.read().await;
        let mut latest: Vec<StoredMessage> = inner
            .messages
            .iter()
            .rev()
            .filter(|m| m.conversation_id == conversation_id)
            .take(limit as usize)
            .cloned()
            .collect();
        latest.reverse();
        Ok(latest)
    }

    async fn create_private_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<ConversationId, ChatError> {
        let mut inner = self.inner.write().await;
        inner.ensure_users([&user_a, &user_b])?;
        let existing = inner.conversations.iter().find_map(|(id, c)| {
            (c.kind == ConversationKind::Private
                && c.members.contains(&user_a)
                && c.members.contains(&user_b))
            .then_some(*id)
        });
        if let Some(id) = existing {
            return Ok(id);
        }
        let id = inner.next_conversation_id();
        inner.conversations.insert(
            id,
            Conversation {
                kind: ConversationKind::Private,
                members: vec![user_a, user_b],
            },
        );
        Ok(id)
    }

    async fn create_group_conversation(
        &self,
        creator: UserId,
        members: &[UserId],
    ) -> Result<ConversationId, ChatError> {
        let mut inner = self.inner.write().await;
        let members = group_members(creator, members);
        inner.ensure_users(&members)?;
        let id = inner.next_conversation_id();
        inner.conversations.insert(
            id,
            Conversation {
                kind: ConversationKind::Group,
                members,
            },
        );
        Ok(id)
    }

    async fn is_member(
        &self,
        conversation_id: ConversationId,
        user: UserId,
    ) -> Result<bool, ChatError> {
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .get(&conversation_id)
            .is_some_and(|c| c.members.contains(&user)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, ChatError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == username) {
            return Err(ChatError::Conflict(format!(
                "username {username} already exists"
            )));
        }
        inner.last_user_id = inner.last_user_id.saturating_add(1);
        let record = UserRecord {
            id: UserId::new(inner.last_user_id),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, ChatError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserSummary>, ChatError> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        let mut found: Vec<UserSummary> = inner
            .users
            .values()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .map(UserSummary::from)
            .collect();
        found.sort_by_key(|u| u.id);
        found.truncate(limit as usize);
        Ok(found)
    }
}
