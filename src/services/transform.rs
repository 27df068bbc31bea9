//! Conversion of GitHub API records into tracked `PullRequest` values.

use crate::error::AppError;
use crate::models::{CheckRun, CombinedState, PullRequest};
use crate::services::ci_status::classify_ci_status;
use crate::services::github_client::{GitHubPullRequest, PullRequestCiStatuses, PullRequestDetails};
use chrono::{DateTime, Utc};

/// Whether a pull request was opened by one of the tracked authors.
pub fn should_track_pr(pr: &GitHubPullRequest, tracked_authors: &[String]) -> bool {
    tracked_authors.iter().any(|a| a == &pr.user.login)
}

/// Parse a GitHub RFC 3339 timestamp. An empty string means "not set".
pub fn parse_github_timestamp(value: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = DateTime::parse_from_rfc3339(value)?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

/// Latest of a set of optional raw timestamps; unparsable values are skipped.
fn latest<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Option<DateTime<Utc>> {
    values
        .into_iter()
        .flatten()
        .filter_map(|v| parse_github_timestamp(v).ok().flatten())
        .max()
}

/// Most recent edit across issue and review comments.
pub fn latest_comment_time(details: &PullRequestDetails) -> Option<DateTime<Utc>> {
    let issue = details.issue_comments.iter().map(|c| Some(c.updated_at.as_str()));
    let review = details.review_comments.iter().map(|c| Some(c.updated_at.as_str()));
    latest(issue.chain(review))
}

/// Most recent check run or commit status activity on the head commit.
pub fn latest_commit_activity_time(ci: &PullRequestCiStatuses) -> Option<DateTime<Utc>> {
    let runs = ci
        .check_runs
        .iter()
        .flat_map(|r| [r.completed_at.as_deref(), r.started_at.as_deref()]);
    let statuses = ci
        .statuses
        .iter()
        .flat_map(|s| [s.updated_at.as_deref(), s.created_at.as_deref()]);
    latest(runs.chain(statuses))
}

/// Build the tracked record for one pull request.
///
/// Local-only fields start empty; the reconciler carries them over from
/// storage when the record already exists.
pub fn to_pull_request(
    repository: &str,
    details: &PullRequestDetails,
    ci: &PullRequestCiStatuses,
) -> Result<PullRequest, AppError> {
    let pr = &details.pull_request;
    let created_at = parse_github_timestamp(&pr.created_at)?.ok_or_else(|| {
        AppError::invalid_input_field("pull request has no created_at", "created_at")
    })?;
    let updated_at = parse_github_timestamp(&pr.updated_at)?.unwrap_or(created_at);

    let check_runs: Vec<CheckRun> = ci
        .check_runs
        .iter()
        .map(|r| CheckRun::from_raw(&r.status, r.conclusion.as_deref()))
        .collect();
    let ci_status = classify_ci_status(
        &check_runs,
        CombinedState::from(ci.combined_state.as_str()),
    );

    Ok(PullRequest {
        repository: repository.to_string(),
        number: pr.number,
        title: pr.title.clone(),
        author: pr.user.login.clone(),
        draft: pr.draft,
        created_at,
        updated_at,
        ci_status,
        last_comment_at: latest_comment_time(details),
        last_commit_at: latest_commit_activity_time(ci),
        last_ci_status_update_at: None,
        last_acknowledged_at: None,
        requested_reviewers: pr.requested_reviewers.iter().map(|u| u.login.clone()).collect(),
    })
}
