//! Tracked authors, tracked repositories and the authenticated user.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::User;

/// Logins whose pull requests are tracked, alphabetically.
pub async fn get_tracked_authors(pool: &DbPool) -> Result<Vec<String>, AppError> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT login FROM tracked_authors ORDER BY login")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(login,)| login).collect())
}

/// Start tracking an author. Returns false if already tracked.
pub async fn add_tracked_author(pool: &DbPool, login: &str) -> Result<bool, AppError> {
    let login = login.trim();
    if login.is_empty() {
        return Err(AppError::invalid_input_field("author login cannot be empty", "login"));
    }

    let result = sqlx::query("INSERT OR IGNORE INTO tracked_authors (login) VALUES (?)")
        .bind(login)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Stop tracking an author. Returns whether it was tracked.
pub async fn remove_tracked_author(pool: &DbPool, login: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM tracked_authors WHERE login = ?")
        .bind(login.trim())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Repositories (`owner/repo`) that are synced, alphabetically.
pub async fn get_tracked_repositories(pool: &DbPool) -> Result<Vec<String>, AppError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM tracked_repositories ORDER BY name")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Start syncing a repository. Returns false if already tracked.
///
/// The name must be in `owner/repo` form.
pub async fn add_tracked_repository(pool: &DbPool, name: &str) -> Result<bool, AppError> {
    let name = name.trim();
    crate::services::github_client::validate_repository(name)?;

    let result = sqlx::query("INSERT OR IGNORE INTO tracked_repositories (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Stop syncing a repository and drop its stored pull requests.
///
/// Returns whether the repository was tracked.
pub async fn remove_tracked_repository(pool: &DbPool, name: &str) -> Result<bool, AppError> {
    let name = name.trim();
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM tracked_repositories WHERE name = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM pull_requests WHERE repository = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// The authenticated user, if any.
pub async fn get_user(pool: &DbPool) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT username, access_token, created_at FROM users WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Store (or replace) the authenticated user.
pub async fn save_user(pool: &DbPool, username: &str, access_token: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, access_token) VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            access_token = excluded.access_token,
            created_at = strftime('%s', 'now')
        "#,
    )
    .bind(username)
    .bind(access_token)
    .execute(pool)
    .await?;
    Ok(())
}

/// Forget the authenticated user. Returns whether one was stored.
pub async fn delete_user(pool: &DbPool) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = 1")
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
