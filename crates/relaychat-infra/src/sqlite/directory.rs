//! Recipient directory backed by chat membership in the store.

use relaychat_core::notify::directory::RecipientDirectory;
use relaychat_types::error::NotifyError;
use sqlx::Row;

use super::pool::DatabasePool;

/// Resolves chat members' email addresses from `chat_members`.
#[derive(Clone)]
pub struct SqliteRecipientDirectory {
    pool: DatabasePool,
}

impl SqliteRecipientDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl RecipientDirectory for SqliteRecipientDirectory {
    async fn recipients(&self, chat_id: i64) -> Result<Vec<String>, NotifyError> {
        let rows = sqlx::query("SELECT email FROM chat_members WHERE chat_id = ? ORDER BY position ASC")
            .bind(chat_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| NotifyError::Directory(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("email")
                    .map_err(|e| NotifyError::Directory(e.to_string()))
            })
            .collect()
    }
}
