//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. `DatabasePool` pairs a
//! multi-connection reader pool for history reads with a single-connection
//! writer pool that serializes inserts, so message ids are handed out in
//! commit order.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// File name of the message store inside the data directory.
pub const DATABASE_FILE: &str = "relaychat.db";

/// Reader connections opened by [`DatabasePool::new`].
pub const DEFAULT_READERS: u32 = 8;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader pool for history queries plus a one-connection writer pool.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::with_readers(database_url, DEFAULT_READERS).await
    }

    /// Open the store with `readers` read-only connections. Migrations run on
    /// the writer first so readers never see a partial schema.
    pub async fn with_readers(database_url: &str, readers: u32) -> Result<Self, sqlx::Error> {
        let opts = connect_options(database_url)?;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(readers.max(1))
            .connect_with(opts.read_only(true))
            .await?;

        tracing::debug!(readers, "message store opened");
        Ok(Self { reader, writer })
    }
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true))
}

/// `sqlite://{data_dir}/relaychat.db`
pub fn database_url_for(data_dir: &Path) -> String {
    format!("sqlite://{}", data_dir.join(DATABASE_FILE).display())
}
