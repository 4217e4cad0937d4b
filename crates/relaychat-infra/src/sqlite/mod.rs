//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod chat;
pub mod directory;
pub mod pool;

use relaychat_types::error::RepositoryError;

/// Map a sqlx error, recognizing constraint violations.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection
        }
        other => RepositoryError::Query(other.to_string()),
    }
}
