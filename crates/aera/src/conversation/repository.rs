//! Conversation repository for database operations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::models::{Conversation, Message, MessageRole};
use crate::db::timestamp_now;

/// Repository for conversation and message storage.
#[derive(Debug, Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    /// Create a new conversation repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a conversation owned by `owner_id`.
    #[instrument(skip(self, title))]
    pub async fn create(&self, owner_id: &str, title: &str) -> Result<Conversation> {
        let id = Uuid::new_v4().to_string();
        let now = timestamp_now();

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, title, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(title)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("Failed to insert conversation")?;

        debug!(conversation_id = %id, "Created conversation");

        Ok(Conversation {
            id,
            user_id: owner_id.to_string(),
            title: title.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// List every conversation owned by `owner_id`, most recently updated first.
    #[instrument(skip(self))]
    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Conversation>> {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, user_id, title, created_at, updated_at
            FROM conversations
            WHERE user_id = ?
            ORDER BY updated_at DESC, rowid DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list conversations")
    }

    /// Fetch a conversation only if it belongs to `owner_id`.
    #[instrument(skip(self))]
    pub async fn get_owned(&self, id: &str, owner_id: &str) -> Result<Option<Conversation>> {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, user_id, title, created_at, updated_at
            FROM conversations
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch conversation")
    }

    /// List the messages of a conversation in the order they were written.
    ///
    /// Callers must have checked ownership with [`Self::get_owned`].
    #[instrument(skip(self))]
    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, role, content, created_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list messages")
    }

    /// Append a message. Fails if the conversation does not exist.
    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let id = Uuid::new_v4().to_string();
        let now = timestamp_now();

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(role.to_string())
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("Failed to insert message")?;

        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Number of messages stored for a conversation.
    pub async fn count_messages(&self, conversation_id: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count messages")
    }

    /// Set `updated_at` to now.
    #[instrument(skip(self))]
    pub async fn touch(&self, conversation_id: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(timestamp_now())
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .context("Failed to touch conversation")?;
        Ok(())
    }

    /// Rename a conversation. Returns `false` when it is absent or not owned.
    #[instrument(skip(self, title))]
    pub async fn rename(&self, id: &str, owner_id: &str, title: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE conversations SET title = ? WHERE id = ? AND user_id = ?")
            .bind(title)
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .context("Failed to rename conversation")?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a conversation and its messages, messages first.
    ///
    /// Returns `false` when the conversation is absent or not owned; nothing is
    /// deleted in that case.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str, owner_id: &str) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM conversations WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to check conversation ownership")?;

        if owned == 0 {
            return Ok(false);
        }

        let removed = sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete messages")?
            .rows_affected();

        sqlx::query("DELETE FROM conversations WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete conversation")?;

        tx.commit().await.context("Failed to commit deletion")?;

        debug!(conversation_id = %id, messages = removed, "Deleted conversation");
        Ok(true)
    }
}
