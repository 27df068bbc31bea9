//! Pull request model.

use crate::models::CiStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity of a pull request: repository (`owner/repo`) plus number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrKey {
    pub repository: String,
    pub number: i64,
}

impl PrKey {
    pub fn new(repository: impl Into<String>, number: i64) -> Self {
        Self {
            repository: repository.into(),
            number,
        }
    }
}

impl std::fmt::Display for PrKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}

/// A tracked pull request.
///
/// Descriptive fields and `requested_reviewers` are overwritten from GitHub on
/// every relevant sync. `last_ci_status_update_at` and `last_acknowledged_at`
/// exist only locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Repository with owner (e.g., "acme/widgets").
    pub repository: String,

    /// Repository-scoped PR number.
    pub number: i64,

    pub title: String,

    /// Author's GitHub login.
    pub author: String,

    pub draft: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Classified CI state of the head commit.
    pub ci_status: CiStatus,

    /// Most recent issue or review comment activity.
    pub last_comment_at: Option<DateTime<Utc>>,

    /// Most recent check run or commit status activity on the head commit.
    pub last_commit_at: Option<DateTime<Utc>>,

    /// When `ci_status` last changed value. `None` until a change is observed.
    pub last_ci_status_update_at: Option<DateTime<Utc>>,

    /// Set by the user via `ack`.
    pub last_acknowledged_at: Option<DateTime<Utc>>,

    pub requested_reviewers: BTreeSet<String>,
}

/// Something that happened on a pull request since the user last looked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrUpdate {
    NewComments(DateTime<Utc>),
    NewCommits(DateTime<Utc>),
    CiStatusChanged(CiStatus),
}

impl std::fmt::Display for PrUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewComments(at) => {
                write!(f, "new comments (latest {})", at.format("%Y-%m-%d %H:%M"))
            }
            Self::NewCommits(at) => {
                write!(f, "new commit activity (latest {})", at.format("%Y-%m-%d %H:%M"))
            }
            Self::CiStatusChanged(status) => write!(f, "CI is now {}", status),
        }
    }
}

impl PullRequest {
    pub fn key(&self) -> PrKey {
        PrKey::new(self.repository.clone(), self.number)
    }

    /// URL to the PR in the GitHub web UI.
    pub fn url(&self) -> String {
        format!("https://github.com/{}/pull/{}", self.repository, self.number)
    }

    /// One-line summary for listings.
    pub fn display_string(&self) -> String {
        let draft = if self.draft { " [draft]" } else { "" };
        format!(
            "{}#{} {}{} by {} (CI: {})",
            self.repository, self.number, self.title, draft, self.author, self.ci_status
        )
    }

    /// Activity newer than the last acknowledgment. Everything counts if the
    /// PR was never acknowledged.
    pub fn updates_since_last_ack(&self) -> Vec<PrUpdate> {
        let is_new = |at: DateTime<Utc>| match self.last_acknowledged_at {
            Some(ack) => at > ack,
            None => true,
        };

        let mut updates = Vec::new();
        if let Some(at) = self.last_comment_at.filter(|at| is_new(*at)) {
            updates.push(PrUpdate::NewComments(at));
        }
        if let Some(at) = self.last_commit_at.filter(|at| is_new(*at)) {
            updates.push(PrUpdate::NewCommits(at));
        }
        if self.last_ci_status_update_at.is_some_and(is_new) {
            updates.push(PrUpdate::CiStatusChanged(self.ci_status));
        }
        updates
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    /// Fixed base time shared by tests.
    pub fn t(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hours)
    }

    pub fn pr(repository: &str, number: i64) -> PullRequest {
        PullRequest {
            repository: repository.to_string(),
            number,
            title: format!("PR {}", number),
            author: "octocat".to_string(),
            draft: false,
            created_at: t(0),
            updated_at: t(0),
            ci_status: CiStatus::Pending,
            last_comment_at: Some(t(0)),
            last_commit_at: Some(t(0)),
            last_ci_status_update_at: None,
            last_acknowledged_at: None,
            requested_reviewers: BTreeSet::new(),
        }
    }
}
