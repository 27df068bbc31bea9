//! Sync engine for tracked GitHub pull requests.
//!
//! A sync pass walks every tracked repository:
//! - Lists open pull requests and keeps those by tracked authors
//! - Fetches comments and CI state for each one, a few at a time
//! - Reconciles the fresh records against storage and applies the result
//! - Records the outcome in the sync log

use crate::db::pool::DbPool;
use crate::db::{pull_requests, sync_log, tracking};
use crate::error::AppError;
use crate::models::{PrKey, PullRequest};
use crate::services::github_client::{GitHubClient, GitHubPullRequest};
use crate::services::reconciler::{reconcile, Reconciliation};
use crate::services::transform::{should_track_pr, to_pull_request};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time;

/// Default sync interval in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Default number of pull requests fetched in parallel.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Sync engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Sync interval in seconds.
    pub interval_secs: u64,

    /// Pull requests whose details are fetched concurrently.
    pub max_concurrent_requests: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

/// Result of a sync operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    /// Pull requests inserted.
    pub new_count: usize,

    /// Pull requests rewritten because something relevant changed.
    pub updated_count: usize,

    /// Pull requests deleted because they are no longer open.
    pub removed_count: usize,

    /// Per-repository or per-PR failures that did not abort the pass.
    pub errors: Vec<String>,

    /// Duration of the sync in milliseconds.
    pub duration_ms: i64,
}

impl SyncResult {
    fn absorb(&mut self, diff: &Reconciliation) {
        self.new_count += diff.new.len();
        self.updated_count += diff.updated.len();
        self.removed_count += diff.removed.len();
    }

    fn summary(&self) -> String {
        format!(
            "{} new, {} updated, {} removed, {} errors",
            self.new_count,
            self.updated_count,
            self.removed_count,
            self.errors.len()
        )
    }
}

/// Fresh records of one repository plus the keys that could not be fetched.
#[derive(Debug, Default)]
struct RepositoryFetch {
    fresh: Vec<PullRequest>,
    failed: HashSet<PrKey>,
    errors: Vec<String>,
}

/// Drop stored records whose refresh failed.
///
/// A record missing from the fresh set is deleted by reconciliation, so one
/// that merely failed to load has to be taken out of the comparison.
fn exclude_failed(stored: Vec<PullRequest>, failed: &HashSet<PrKey>) -> Vec<PullRequest> {
    if failed.is_empty() {
        return stored;
    }
    stored
        .into_iter()
        .filter(|pr| !failed.contains(&pr.key()))
        .collect()
}

/// Synchronizes tracked repositories into the local database.
pub struct SyncEngine {
    /// Database connection pool.
    pool: DbPool,

    /// Authenticated GitHub client.
    client: GitHubClient,

    config: SyncConfig,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(pool: DbPool, client: GitHubClient, config: SyncConfig) -> Self {
        Self {
            pool,
            client,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run a single sync pass over every tracked repository.
    ///
    /// A failing repository is recorded in `errors` and left untouched in
    /// storage. An expired token aborts the pass.
    pub async fn run_sync(&self) -> Result<SyncResult, AppError> {
        let start = Instant::now();
        let mut result = SyncResult::default();

        let repositories = tracking::get_tracked_repositories(&self.pool).await?;
        let authors = tracking::get_tracked_authors(&self.pool).await?;

        if repositories.is_empty() || authors.is_empty() {
            log::info!(
                "nothing to sync ({} repositories, {} authors tracked)",
                repositories.len(),
                authors.len()
            );
        } else {
            log::info!(
                "syncing {} repositories for {} authors",
                repositories.len(),
                authors.len()
            );
        }

        if !authors.is_empty() {
            for repository in &repositories {
                match self.sync_repository(repository, &authors).await {
                    Ok((diff, errors)) => {
                        log::info!(
                            "[{}] {} new, {} updated, {} removed",
                            repository,
                            diff.new.len(),
                            diff.updated.len(),
                            diff.removed.len()
                        );
                        result.absorb(&diff);
                        result.errors.extend(errors);
                    }
                    Err(e) if e.is_authentication_expired() => {
                        sync_log::log_sync_operation(
                            &self.pool,
                            "sync_complete",
                            "error",
                            None,
                            Some(failure_message(&e)),
                            Some(start.elapsed().as_millis() as i64),
                        )
                        .await?;
                        return Err(e);
                    }
                    Err(e) => {
                        log::warn!("[{}] sync failed: {}", repository, e);
                        sync_log::log_sync_operation(
                            &self.pool,
                            "sync_repository",
                            "error",
                            Some(repository),
                            Some(failure_message(&e)),
                            None,
                        )
                        .await?;
                        result.errors.push(format!("{}: {}", repository, e));
                    }
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as i64;
        log::info!("sync complete in {}ms: {}", result.duration_ms, result.summary());

        sync_log::log_sync_operation(
            &self.pool,
            "sync_complete",
            if result.errors.is_empty() { "success" } else { "error" },
            None,
            Some(result.summary()),
            Some(result.duration_ms),
        )
        .await?;

        Ok(result)
    }

    /// Sync one repository. Returns the applied reconciliation and the
    /// per-PR errors that were tolerated.
    async fn sync_repository(
        &self,
        repository: &str,
        authors: &[String],
    ) -> Result<(Reconciliation, Vec<String>), AppError> {
        let open = self.client.list_open_pull_requests(repository).await?;
        let tracked: Vec<GitHubPullRequest> = open
            .into_iter()
            .filter(|pr| should_track_pr(pr, authors))
            .collect();
        log::debug!("[{}] {} open pull requests by tracked authors", repository, tracked.len());

        let fetch = self.fetch_repository(repository, tracked).await?;

        let stored = pull_requests::get_pull_requests_for_repository(&self.pool, repository).await?;
        let stored = exclude_failed(stored, &fetch.failed);

        let diff = reconcile(&stored, fetch.fresh, Utc::now());
        pull_requests::apply_reconciliation(&self.pool, &diff).await?;

        Ok((diff, fetch.errors))
    }

    /// Fetch details and CI state of each listed pull request concurrently.
    async fn fetch_repository(
        &self,
        repository: &str,
        listed: Vec<GitHubPullRequest>,
    ) -> Result<RepositoryFetch, AppError> {
        let outcomes: Vec<(i64, Result<PullRequest, AppError>)> = stream::iter(listed)
            .map(|pr| async move {
                let number = pr.number;
                (number, self.fetch_pull_request(repository, number).await)
            })
            .buffer_unordered(self.config.max_concurrent_requests.max(1))
            .collect()
            .await;

        let mut fetch = RepositoryFetch::default();
        for (number, outcome) in outcomes {
            match outcome {
                Ok(pr) => fetch.fresh.push(pr),
                Err(e) if e.is_authentication_expired() => return Err(e),
                Err(e) => {
                    log::warn!("[{}#{}] fetch failed: {}", repository, number, e);
                    fetch.errors.push(format!("{}#{}: {}", repository, number, e));
                    fetch.failed.insert(PrKey::new(repository, number));
                }
            }
        }
        Ok(fetch)
    }

    async fn fetch_pull_request(
        &self,
        repository: &str,
        number: i64,
    ) -> Result<PullRequest, AppError> {
        let details = self.client.fetch_pull_request_details(repository, number).await?;
        let ci = self
            .client
            .fetch_ci_statuses(repository, &details.pull_request.head.sha)
            .await?;
        to_pull_request(repository, &details, &ci)
    }

    /// Sync now, then every `interval` until Ctrl-C.
    ///
    /// Failed passes are logged and retried on the next tick, except an
    /// expired token, which ends the loop. Ctrl-C during a pass abandons it;
    /// its database writes are transactional.
    pub async fn run_periodic(&self, interval: Duration) -> Result<(), AppError> {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        // A single listener spans the whole loop, polled first on every wait.
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                biased;
                signal = &mut ctrl_c => return stopped(signal),
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                signal = &mut ctrl_c => return stopped(signal),
                outcome = self.run_sync() => match outcome {
                    Ok(_) => {}
                    Err(e) if e.is_authentication_expired() => return Err(e),
                    Err(e) => log::error!("sync failed: {}", e),
                },
            }
        }
    }
}

fn stopped(signal: std::io::Result<()>) -> Result<(), AppError> {
    signal.map_err(|e| AppError::internal(format!("Failed to listen for Ctrl-C: {}", e)))?;
    log::info!("stopping periodic sync");
    Ok(())
}

/// Sync log message for a failure: the error as tagged JSON.
fn failure_message(error: &AppError) -> String {
    serde_json::to_string(error).unwrap_or_else(|_| error.to_string())
}
