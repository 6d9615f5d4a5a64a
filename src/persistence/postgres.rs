//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{ConversationKind, StoredMessage, UserRecord, UserSummary};
use super::{ChatStore, UNKNOWN_MESSAGE_TARGET, UNKNOWN_USERS, UserStore, group_members};
use crate::config::ServerConfig;
use crate::domain::{ChatMessage, ConversationId, UserId};
use crate::error::ChatError;

type MessageRow = (i64, i64, i64, String, String, DateTime<Utc>);

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError::Persistence`] if the database is unreachable.
    pub async fn connect(config: &ServerConfig) -> Result<Self, ChatError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| ChatError::Persistence(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), ChatError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ChatError::Persistence(format!("migration failed: {e}")))
    }
}

fn db_err(e: sqlx::Error) -> ChatError {
    ChatError::Persistence(e.to_string())
}

/// Maps an insert failure, reporting a foreign key violation as
/// [`ChatError::NotFound`] with `missing` as the message.
fn missing_ref_err(e: sqlx::Error, missing: &str) -> ChatError {
    if let sqlx::Error::Database(db) = &e
        && db.is_foreign_key_violation()
    {
        return ChatError::NotFound(missing.to_string());
    }
    db_err(e)
}

fn participant_err(e: sqlx::Error) -> ChatError {
    missing_ref_err(e, UNKNOWN_USERS)
}

/// Escapes `LIKE` wildcards so user input matches literally.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl ChatStore for PostgresStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<i64, ChatError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO messages (conversation_id, sender_id, content, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(message.conversation_id().get())
        .bind(message.sender_id().get())
        .bind(message.content())
        .bind(message.created_at())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_ref_err(e, UNKNOWN_MESSAGE_TARGET))
    }

    async fn conversation_members(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<UserId>, ChatError> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM participants WHERE conversation_id = $1",
        )
        .bind(conversation_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(UserId::new).collect())
    }

    async fn history(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, ChatError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, sender_id, username, content, created_at FROM ( \
                 SELECT m.id, m.conversation_id, m.sender_id, u.username, m.content, m.created_at \
                 FROM messages m JOIN users u ON m.sender_id = u.id \
                 WHERE m.conversation_id = $1 \
                 ORDER BY m.created_at DESC, m.id DESC LIMIT $2 \
             ) latest ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id.get())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, conversation_id, sender_id, username, content, created_at)| StoredMessage {
                    id,
                    conversation_id: ConversationId::new(conversation_id),
                    sender_id: UserId::new(sender_id),
                    username,
                    content,
                    created_at,
                },
            )
            .collect())
    }

    async fn create_private_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<ConversationId, ChatError> {
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT c.id FROM conversations c \
             JOIN participants p1 ON c.id = p1.conversation_id \
             JOIN participants p2 ON c.id = p2.conversation_id \
             WHERE c.kind = 'private' AND p1.user_id = $1 AND p2.user_id = $2 \
             LIMIT 1",
        )
        .bind(user_a.get())
        .bind(user_b.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some(id) = existing {
            return Ok(ConversationId::new(id));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO conversations (kind) VALUES ($1) RETURNING id",
        )
        .bind(ConversationKind::Private.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO participants (conversation_id, user_id) \
             SELECT $1, unnest($2::bigint[])",
        )
        .bind(id)
        .bind(vec![user_a.get(), user_b.get()])
        .execute(&mut *tx)
        .await
        .map_err(participant_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(ConversationId::new(id))
    }

    async fn create_group_conversation(
        &self,
        creator: UserId,
        members: &[UserId],
    ) -> Result<ConversationId, ChatError> {
        let all: Vec<i64> = group_members(creator, members)
            .into_iter()
            .map(UserId::get)
            .collect();

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO conversations (kind) VALUES ($1) RETURNING id",
        )
        .bind(ConversationKind::Group.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO participants (conversation_id, user_id) \
             SELECT $1, unnest($2::bigint[])",
        )
        .bind(id)
        .bind(all)
        .execute(&mut *tx)
        .await
        .map_err(participant_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(ConversationId::new(id))
    }

    async fn is_member(
        &self,
        conversation_id: ConversationId,
        user: UserId,
    ) -> Result<bool, ChatError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM participants \
             WHERE conversation_id = $1 AND user_id = $2)",
        )
        .bind(conversation_id.get())
        .bind(user.get())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, ChatError> {
        let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
             RETURNING id, created_at",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e
                && db.is_unique_violation()
            {
                return ChatError::Conflict(format!("username {username} already exists"));
            }
            db_err(e)
        })?;

        Ok(UserRecord {
            id: UserId::new(id),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, ChatError> {
        let row = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>)>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|(id, username, password_hash, created_at)| UserRecord {
            id: UserId::new(id),
            username,
            password_hash,
            created_at,
        }))
    }

    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserSummary>, ChatError> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, username FROM users WHERE username ILIKE $1 ORDER BY id LIMIT $2",
        )
        .bind(format!("%{}%", escape_like(query)))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(id, username)| UserSummary {
                id: UserId::new(id),
                username,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }
}
