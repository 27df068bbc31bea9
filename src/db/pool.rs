//! SQLite connection pool.
//!
//! The tracker is a single-writer CLI, but the periodic sync and a concurrent
//! `prs`/`ack` invocation may touch the same file, so the pool runs in WAL
//! mode with a generous busy timeout.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<Sqlite>;

/// Connections kept by the pool. Writes are serialized by SQLite anyway.
const MAX_CONNECTIONS: u32 = 4;

/// Open (creating if missing) the database file at `db_path`.
///
/// The parent directory must already exist.
pub async fn create_pool(db_path: &Path) -> Result<DbPool, sqlx::Error> {
    let connect_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await?;

    let mode: (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(&pool).await?;
    if !mode.0.eq_ignore_ascii_case("wal") {
        log::warn!("SQLite journal mode is {} instead of wal", mode.0);
    }

    Ok(pool)
}
