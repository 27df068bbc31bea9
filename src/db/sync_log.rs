//! Bounded history of sync runs.

use crate::db::pool::DbPool;
use crate::error::AppError;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum number of log entries to keep.
pub const MAX_LOG_ENTRIES: i64 = 50;

/// Sync log entry matching the sync_log table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SyncLogEntry {
    pub id: i64,
    pub operation: String,
    pub status: String,
    pub repository: Option<String>,
    pub message: Option<String>,
    pub duration_ms: Option<i64>,
    pub timestamp: i64,
}

impl SyncLogEntry {
    /// The error a failed sync stored, when the message holds one.
    pub fn failure(&self) -> Option<AppError> {
        if self.status != "error" {
            return None;
        }
        self.message.as_deref().and_then(|m| serde_json::from_str(m).ok())
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Append an entry and prune the log to [`MAX_LOG_ENTRIES`].
pub async fn log_sync_operation(
    pool: &DbPool,
    operation: &str,
    status: &str,
    repository: Option<&str>,
    message: Option<String>,
    duration_ms: Option<i64>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO sync_log (operation, status, repository, message, duration_ms, timestamp)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(operation)
    .bind(status)
    .bind(repository)
    .bind(&message)
    .bind(duration_ms)
    .bind(now())
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        DELETE FROM sync_log WHERE id NOT IN (
            SELECT id FROM sync_log ORDER BY timestamp DESC, id DESC LIMIT ?
        )
        "#,
    )
    .bind(MAX_LOG_ENTRIES)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent entries first.
pub async fn get_sync_log(pool: &DbPool, limit: i64) -> Result<Vec<SyncLogEntry>, AppError> {
    let entries = sqlx::query_as::<_, SyncLogEntry>(
        "SELECT id, operation, status, repository, message, duration_ms, timestamp \
         FROM sync_log ORDER BY timestamp DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_log_and_read_back() {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();

        log_sync_operation(
            &pool,
            "sync_repository",
            "error",
            Some("acme/a"),
            Some("boom".into()),
            None,
        )
        .await
        .unwrap();
        log_sync_operation(&pool, "sync_complete", "success", None, None, Some(42))
            .await
            .unwrap();

        let entries = get_sync_log(&pool, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, "sync_complete");
        assert_eq!(entries[0].duration_ms, Some(42));
        assert_eq!(entries[1].repository.as_deref(), Some("acme/a"));
        assert_eq!(entries[1].message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_failure_decodes_stored_error() {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();

        let stored = serde_json::to_string(&AppError::authentication_expired("token revoked"));
        log_sync_operation(&pool, "sync_complete", "error", None, stored.ok(), None)
            .await
            .unwrap();
        log_sync_operation(&pool, "sync_complete", "error", None, Some("2 errors".into()), None)
            .await
            .unwrap();
        log_sync_operation(&pool, "sync_complete", "success", None, None, Some(7))
            .await
            .unwrap();

        let entries = get_sync_log(&pool, 10).await.unwrap();
        assert!(entries[0].failure().is_none());
        assert!(entries[1].failure().is_none());
        match entries[2].failure() {
            Some(AppError::AuthenticationExpired { message }) => {
                assert_eq!(message, "token revoked")
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_log_is_pruned() {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();

        for i in 0..(MAX_LOG_ENTRIES + 5) {
            log_sync_operation(&pool, "sync_complete", "success", None, Some(i.to_string()), None)
                .await
                .unwrap();
        }

        let entries = get_sync_log(&pool, 1000).await.unwrap();
        assert_eq!(entries.len() as i64, MAX_LOG_ENTRIES);
        let newest = (MAX_LOG_ENTRIES + 4).to_string();
        assert_eq!(entries[0].message.as_deref(), Some(newest.as_str()));
    }
}
