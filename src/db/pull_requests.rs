//! Database queries for tracked pull requests.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{CiStatus, PrKey, PullRequest};
use crate::services::reconciler::Reconciliation;
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{FromRow, Sqlite};
use std::collections::BTreeSet;

const SELECT_COLUMNS: &str = "SELECT repository, number, title, author, draft, created_at, \
     updated_at, ci_status, last_comment_at, last_commit_at, last_ci_status_update_at, \
     last_acknowledged_at, requested_reviewers FROM pull_requests";

/// Row shape of the `pull_requests` table.
///
/// Timestamps are Unix seconds and `requested_reviewers` is a JSON array.
#[derive(Debug, Clone, FromRow)]
struct PullRequestRow {
    repository: String,
    number: i64,
    title: String,
    author: String,
    draft: bool,
    created_at: i64,
    updated_at: i64,
    ci_status: String,
    last_comment_at: Option<i64>,
    last_commit_at: Option<i64>,
    last_ci_status_update_at: Option<i64>,
    last_acknowledged_at: Option<i64>,
    requested_reviewers: String,
}

fn from_unix(secs: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::database(format!("timestamp out of range: {}", secs)))
}

fn from_unix_opt(secs: Option<i64>) -> Result<Option<DateTime<Utc>>, AppError> {
    secs.map(from_unix).transpose()
}

impl TryFrom<PullRequestRow> for PullRequest {
    type Error = AppError;

    fn try_from(row: PullRequestRow) -> Result<Self, Self::Error> {
        let requested_reviewers: BTreeSet<String> = serde_json::from_str(&row.requested_reviewers)
            .map_err(|e| {
                AppError::database_with_op(
                    format!(
                        "invalid requested_reviewers for {}#{}: {}",
                        row.repository, row.number, e
                    ),
                    "decode_pull_request",
                )
            })?;

        Ok(PullRequest {
            created_at: from_unix(row.created_at)?,
            updated_at: from_unix(row.updated_at)?,
            ci_status: CiStatus::from(row.ci_status.as_str()),
            last_comment_at: from_unix_opt(row.last_comment_at)?,
            last_commit_at: from_unix_opt(row.last_commit_at)?,
            last_ci_status_update_at: from_unix_opt(row.last_ci_status_update_at)?,
            last_acknowledged_at: from_unix_opt(row.last_acknowledged_at)?,
            requested_reviewers,
            repository: row.repository,
            number: row.number,
            title: row.title,
            author: row.author,
            draft: row.draft,
        })
    }
}

fn into_pull_requests(rows: Vec<PullRequestRow>) -> Result<Vec<PullRequest>, AppError> {
    rows.into_iter().map(PullRequest::try_from).collect()
}

/// Bound upsert statement for one record.
///
/// Local-only fields are never cleared by an upsert: a `NULL` coming in keeps
/// whatever the row already holds.
fn upsert_query(pr: &PullRequest) -> Result<Query<'_, Sqlite, SqliteArguments<'_>>, AppError> {
    let reviewers_json = serde_json::to_string(&pr.requested_reviewers)?;

    Ok(sqlx::query(
        r#"
        INSERT INTO pull_requests (
            repository, number, title, author, draft, created_at, updated_at,
            ci_status, last_comment_at, last_commit_at, last_ci_status_update_at,
            last_acknowledged_at, requested_reviewers
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(repository, number) DO UPDATE SET
            title = excluded.title,
            author = excluded.author,
            draft = excluded.draft,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at,
            ci_status = excluded.ci_status,
            last_comment_at = excluded.last_comment_at,
            last_commit_at = excluded.last_commit_at,
            last_ci_status_update_at = COALESCE(excluded.last_ci_status_update_at, pull_requests.last_ci_status_update_at),
            last_acknowledged_at = COALESCE(excluded.last_acknowledged_at, pull_requests.last_acknowledged_at),
            requested_reviewers = excluded.requested_reviewers
        "#,
    )
    .bind(&pr.repository)
    .bind(pr.number)
    .bind(&pr.title)
    .bind(&pr.author)
    .bind(pr.draft)
    .bind(pr.created_at.timestamp())
    .bind(pr.updated_at.timestamp())
    .bind(pr.ci_status.to_string())
    .bind(pr.last_comment_at.map(|t| t.timestamp()))
    .bind(pr.last_commit_at.map(|t| t.timestamp()))
    .bind(pr.last_ci_status_update_at.map(|t| t.timestamp()))
    .bind(pr.last_acknowledged_at.map(|t| t.timestamp()))
    .bind(reviewers_json))
}

/// All stored pull requests, ordered by repository then number.
pub async fn get_all_pull_requests(pool: &DbPool) -> Result<Vec<PullRequest>, AppError> {
    let rows = sqlx::query_as::<_, PullRequestRow>(&format!(
        "{} ORDER BY repository, number",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    into_pull_requests(rows)
}

/// Stored pull requests of one repository.
pub async fn get_pull_requests_for_repository(
    pool: &DbPool,
    repository: &str,
) -> Result<Vec<PullRequest>, AppError> {
    let rows = sqlx::query_as::<_, PullRequestRow>(&format!(
        "{} WHERE repository = ? ORDER BY number",
        SELECT_COLUMNS
    ))
    .bind(repository)
    .fetch_all(pool)
    .await?;

    into_pull_requests(rows)
}

/// Look up a single pull request by identity.
pub async fn get_pull_request(pool: &DbPool, key: &PrKey) -> Result<Option<PullRequest>, AppError> {
    let row = sqlx::query_as::<_, PullRequestRow>(&format!(
        "{} WHERE repository = ? AND number = ?",
        SELECT_COLUMNS
    ))
    .bind(&key.repository)
    .bind(key.number)
    .fetch_optional(pool)
    .await?;

    row.map(PullRequest::try_from).transpose()
}

/// Insert or update a single pull request.
pub async fn upsert_pull_request(pool: &DbPool, pr: &PullRequest) -> Result<(), AppError> {
    upsert_query(pr)?.execute(pool).await?;
    Ok(())
}

/// Delete a pull request. Returns whether a row existed.
pub async fn delete_pull_request(pool: &DbPool, key: &PrKey) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM pull_requests WHERE repository = ? AND number = ?")
        .bind(&key.repository)
        .bind(key.number)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every pull request of a repository. Returns the number removed.
pub async fn delete_pull_requests_for_repository(
    pool: &DbPool,
    repository: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM pull_requests WHERE repository = ?")
        .bind(repository)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Record that the user looked at a pull request. Returns whether it exists.
pub async fn acknowledge_pull_request(
    pool: &DbPool,
    key: &PrKey,
    at: DateTime<Utc>,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE pull_requests SET last_acknowledged_at = ? WHERE repository = ? AND number = ?",
    )
    .bind(at.timestamp())
    .bind(&key.repository)
    .bind(key.number)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Persist a reconciliation pass atomically.
///
/// `new` and `updated` are upserted by identity; `removed` rows are deleted.
pub async fn apply_reconciliation(pool: &DbPool, diff: &Reconciliation) -> Result<(), AppError> {
    if diff.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for pr in diff.new.iter().chain(diff.updated.iter()) {
        upsert_query(pr)?.execute(&mut *tx).await?;
    }

    for pr in &diff.removed {
        sqlx::query("DELETE FROM pull_requests WHERE repository = ? AND number = ?")
            .bind(&pr.repository)
            .bind(pr.number)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::pull_request::test_support::{pr, t};
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, DbPool) {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_every_field() {
        let (_dir, pool) = setup().await;

        let mut original = pr("acme/widgets", 3);
        original.draft = true;
        original.ci_status = CiStatus::Failure;
        original.last_comment_at = None;
        original.last_ci_status_update_at = Some(t(2));
        original.last_acknowledged_at = Some(t(3));
        original.requested_reviewers =
            ["hubot", "monalisa"].iter().map(|s| s.to_string()).collect();

        upsert_pull_request(&pool, &original).await.unwrap();

        let loaded = get_pull_request(&pool, &original.key()).await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_upsert_keeps_local_fields_when_incoming_is_empty() {
        let (_dir, pool) = setup().await;

        let mut stored = pr("acme/widgets", 1);
        stored.last_acknowledged_at = Some(t(4));
        stored.last_ci_status_update_at = Some(t(2));
        upsert_pull_request(&pool, &stored).await.unwrap();

        let mut incoming = pr("acme/widgets", 1);
        incoming.title = "Retitled".to_string();
        upsert_pull_request(&pool, &incoming).await.unwrap();

        let loaded = get_pull_request(&pool, &stored.key()).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Retitled");
        assert_eq!(loaded.last_acknowledged_at, Some(t(4)));
        assert_eq!(loaded.last_ci_status_update_at, Some(t(2)));
    }

    #[tokio::test]
    async fn test_repository_scoped_queries() {
        let (_dir, pool) = setup().await;

        for p in [pr("acme/a", 2), pr("acme/a", 1), pr("acme/b", 1)] {
            upsert_pull_request(&pool, &p).await.unwrap();
        }

        let a = get_pull_requests_for_repository(&pool, "acme/a").await.unwrap();
        assert_eq!(a.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2]);

        assert_eq!(delete_pull_requests_for_repository(&pool, "acme/a").await.unwrap(), 2);
        let all = get_all_pull_requests(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].repository, "acme/b");
    }

    #[tokio::test]
    async fn test_acknowledge_and_delete() {
        let (_dir, pool) = setup().await;
        let p = pr("acme/a", 9);
        upsert_pull_request(&pool, &p).await.unwrap();

        assert!(acknowledge_pull_request(&pool, &p.key(), t(6)).await.unwrap());
        assert!(!acknowledge_pull_request(&pool, &PrKey::new("acme/a", 10), t(6)).await.unwrap());

        let loaded = get_pull_request(&pool, &p.key()).await.unwrap().unwrap();
        assert_eq!(loaded.last_acknowledged_at, Some(t(6)));

        assert!(delete_pull_request(&pool, &p.key()).await.unwrap());
        assert!(!delete_pull_request(&pool, &p.key()).await.unwrap());
        assert!(get_pull_request(&pool, &p.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_reconciliation() {
        let (_dir, pool) = setup().await;
        let keep = pr("acme/a", 1);
        let gone = pr("acme/a", 2);
        upsert_pull_request(&pool, &keep).await.unwrap();
        upsert_pull_request(&pool, &gone).await.unwrap();

        let mut changed = keep.clone();
        changed.ci_status = CiStatus::Success;
        let diff = Reconciliation {
            new: vec![pr("acme/a", 3)],
            updated: vec![changed],
            removed: vec![gone],
        };
        apply_reconciliation(&pool, &diff).await.unwrap();

        let all = get_all_pull_requests(&pool).await.unwrap();
        assert_eq!(all.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(all[0].ci_status, CiStatus::Success);
    }

    #[tokio::test]
    async fn test_corrupt_reviewers_surface_as_error() {
        let (_dir, pool) = setup().await;
        upsert_pull_request(&pool, &pr("acme/a", 1)).await.unwrap();
        sqlx::query("UPDATE pull_requests SET requested_reviewers = 'not json'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(get_all_pull_requests(&pool).await.is_err());
    }
}
