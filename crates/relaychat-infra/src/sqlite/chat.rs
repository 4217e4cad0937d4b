//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `relaychat-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, writes on the single
//! writer connection.

use chrono::{DateTime, Utc};
use relaychat_core::chat::repository::ChatRepository;
use relaychat_types::error::RepositoryError;
use relaychat_types::message::{Chat, ChatMessage, NewMessage};
use sqlx::Row;

use super::map_sqlx_error;
use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    async fn members(&self, chat_id: i64) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT email FROM chat_members WHERE chat_id = ? ORDER BY position ASC")
            .bind(chat_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("email").map_err(|e| RepositoryError::Query(e.to_string())))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping SQLite rows to domain ChatMessage.
struct MessageRow {
    id: i64,
    chat_id: i64,
    sender: String,
    text: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            sender: row.try_get("sender")?,
            text: row.try_get("text")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        Ok(ChatMessage {
            id: self.id,
            chat_id: self.chat_id,
            sender: self.sender,
            text: self.text,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn map_message_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ChatMessage>, RepositoryError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let msg_row = MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        messages.push(msg_row.into_message()?);
    }
    Ok(messages)
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn create_chat(&self, members: &[String]) -> Result<Chat, RepositoryError> {
        let created_at = Utc::now();
        let mut tx = self.pool.writer.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query("INSERT INTO chats (created_at) VALUES (?)")
            .bind(format_datetime(&created_at))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let chat_id = result.last_insert_rowid();

        let mut stored = Vec::with_capacity(members.len());
        for email in members {
            if stored.contains(email) {
                continue;
            }
            sqlx::query("INSERT INTO chat_members (chat_id, position, email) VALUES (?, ?, ?)")
                .bind(chat_id)
                .bind(stored.len() as i64)
                .bind(email)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            stored.push(email.clone());
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(Chat {
            id: chat_id,
            members: stored,
            created_at,
        })
    }

    async fn get_chat(&self, chat_id: i64) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT id, created_at FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Some(Chat {
            id: chat_id,
            members: self.members(chat_id).await?,
            created_at: parse_datetime(&created_at)?,
        }))
    }

    async fn delete_chat(&self, chat_id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id)
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn append_message(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO messages (chat_id, sender, text, created_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(message.chat_id)
        .bind(&message.sender)
        .bind(&message.text)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(message.clone().with_id(result.last_insert_rowid()))
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO messages (id, chat_id, sender, text, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(&message.sender)
        .bind(&message.text)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_message(&self, message_id: i64) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let msg_row =
                    MessageRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(msg_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn history(&self, chat_id: i64) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE chat_id = ? ORDER BY id ASC")
            .bind(chat_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        map_message_rows(&rows)
    }
}
