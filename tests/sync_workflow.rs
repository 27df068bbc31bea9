//! End-to-end sync workflow without the network.
//!
//! GitHub payloads are decoded from JSON, transformed, reconciled against the
//! SQLite store and applied, the same path a real sync pass takes:
//! - First sync inserts everything
//! - An identical second sync writes nothing
//! - Acknowledgment survives later syncs
//! - CI transitions stamp the record and surface as an update
//! - Closed pull requests disappear

use chrono::{DateTime, TimeZone, Utc};
use pr_tracker::db::{self, pool::DbPool, pull_requests};
use pr_tracker::models::{CiStatus, PrKey, PrUpdate, PullRequest};
use pr_tracker::services::github_client::{
    GitHubCheckRun, GitHubCombinedStatus, GitHubIssueComment, GitHubPullRequest,
    PullRequestCiStatuses, PullRequestDetails,
};
use pr_tracker::services::reconciler::reconcile;
use pr_tracker::services::transform::{should_track_pr, to_pull_request};
use serde_json::json;
use tempfile::{tempdir, TempDir};

const REPO: &str = "acme/widgets";

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn github_pr(number: i64, author: &str) -> GitHubPullRequest {
    serde_json::from_value(json!({
        "number": number,
        "title": format!("Change {}", number),
        "state": "open",
        "draft": false,
        "html_url": format!("https://github.com/{}/pull/{}", REPO, number),
        "created_at": "2025-03-01T09:00:00Z",
        "updated_at": "2025-03-01T09:30:00Z",
        "user": { "login": author, "id": 1 },
        "requested_reviewers": [{ "login": "hubot", "id": 2 }],
        "head": { "sha": format!("sha{}", number) }
    }))
    .unwrap()
}

fn comment(updated_at: &str) -> GitHubIssueComment {
    serde_json::from_value(json!({
        "id": 10,
        "body": "looks good",
        "created_at": updated_at,
        "updated_at": updated_at,
        "user": { "login": "hubot" }
    }))
    .unwrap()
}

fn check_run(status: &str, conclusion: Option<&str>, completed_at: &str) -> GitHubCheckRun {
    serde_json::from_value(json!({
        "id": 7,
        "name": "build",
        "status": status,
        "conclusion": conclusion,
        "started_at": "2025-03-01T10:00:00Z",
        "completed_at": completed_at
    }))
    .unwrap()
}

fn ci(sha: &str, runs: Vec<GitHubCheckRun>) -> PullRequestCiStatuses {
    let combined: GitHubCombinedStatus =
        serde_json::from_value(json!({ "state": "pending", "statuses": [] })).unwrap();
    PullRequestCiStatuses {
        head_sha: sha.to_string(),
        combined_state: combined.state,
        statuses: combined.statuses,
        check_runs: runs,
    }
}

fn fresh(
    pr: GitHubPullRequest,
    comments: Vec<GitHubIssueComment>,
    runs: Vec<GitHubCheckRun>,
) -> PullRequest {
    let ci = ci(&pr.head.sha, runs);
    let details = PullRequestDetails {
        pull_request: pr,
        issue_comments: comments,
        review_comments: vec![],
    };
    to_pull_request(REPO, &details, &ci).unwrap()
}

async fn setup() -> (TempDir, DbPool) {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("tracker.db")).await.unwrap();
    (dir, pool)
}

/// One sync cycle against storage. Returns (new, updated, removed) counts.
async fn sync(pool: &DbPool, fresh: Vec<PullRequest>, now: DateTime<Utc>) -> (usize, usize, usize) {
    let stored = pull_requests::get_pull_requests_for_repository(pool, REPO)
        .await
        .unwrap();
    let diff = reconcile(&stored, fresh, now);
    pull_requests::apply_reconciliation(pool, &diff).await.unwrap();
    (diff.new.len(), diff.updated.len(), diff.removed.len())
}

#[tokio::test]
async fn test_full_sync_lifecycle() {
    let (_dir, pool) = setup().await;
    let tracked = vec!["octocat".to_string()];

    let listed = vec![
        github_pr(1, "octocat"),
        github_pr(2, "octocat"),
        github_pr(3, "someone-else"),
    ];
    let listed: Vec<GitHubPullRequest> = listed
        .into_iter()
        .filter(|pr| should_track_pr(pr, &tracked))
        .collect();
    assert_eq!(listed.len(), 2);

    let running = || vec![check_run("in_progress", None, "")];
    let first: Vec<PullRequest> = listed
        .iter()
        .map(|pr| fresh(pr.clone(), vec![], running()))
        .collect();

    // First sync inserts both.
    assert_eq!(sync(&pool, first.clone(), at(1, 12)).await, (2, 0, 0));
    let stored = pull_requests::get_all_pull_requests(&pool).await.unwrap();
    assert_eq!(stored, first);
    assert!(stored.iter().all(|pr| pr.ci_status == CiStatus::Pending));

    // Nothing changed upstream.
    assert_eq!(sync(&pool, first.clone(), at(1, 13)).await, (0, 0, 0));

    // The user looks at #1.
    let key = PrKey::new(REPO, 1);
    assert!(pull_requests::acknowledge_pull_request(&pool, &key, at(1, 14)).await.unwrap());

    // CI on #1 fails and someone comments on #2.
    let second = vec![
        fresh(
            listed[0].clone(),
            vec![],
            vec![check_run("completed", Some("failure"), "2025-03-01T15:00:00Z")],
        ),
        fresh(listed[1].clone(), vec![comment("2025-03-01T16:00:00Z")], running()),
    ];
    assert_eq!(sync(&pool, second.clone(), at(1, 17)).await, (0, 2, 0));

    let one = pull_requests::get_pull_request(&pool, &key).await.unwrap().unwrap();
    assert_eq!(one.ci_status, CiStatus::Failure);
    assert_eq!(one.last_acknowledged_at, Some(at(1, 14)));
    assert_eq!(one.last_ci_status_update_at, Some(at(1, 17)));
    assert!(one
        .updates_since_last_ack()
        .contains(&PrUpdate::CiStatusChanged(CiStatus::Failure)));

    let two = pull_requests::get_pull_request(&pool, &PrKey::new(REPO, 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(two.ci_status, CiStatus::Pending);
    assert_eq!(two.last_ci_status_update_at, None);
    assert_eq!(two.last_comment_at, Some(at(1, 16)));

    // Repeating the same observation is a no-op.
    assert_eq!(sync(&pool, second, at(1, 18)).await, (0, 0, 0));

    // #2 is merged: only #1 is still listed.
    let third = vec![fresh(
        listed[0].clone(),
        vec![],
        vec![check_run("completed", Some("failure"), "2025-03-01T15:00:00Z")],
    )];
    assert_eq!(sync(&pool, third, at(1, 19)).await, (0, 0, 1));

    let remaining = pull_requests::get_all_pull_requests(&pool).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].number, 1);
    assert_eq!(remaining[0].last_acknowledged_at, Some(at(1, 14)));
}

#[tokio::test]
async fn test_cosmetic_edits_do_not_rewrite_storage() {
    let (_dir, pool) = setup().await;
    let original = fresh(github_pr(5, "octocat"), vec![], vec![]);
    assert_eq!(sync(&pool, vec![original.clone()], at(2, 9)).await, (1, 0, 0));

    let mut retitled = github_pr(5, "octocat");
    retitled.title = "A much better title".to_string();
    retitled.draft = true;
    retitled.updated_at = "2025-03-02T10:00:00Z".to_string();
    let edited = fresh(retitled, vec![], vec![]);

    assert_eq!(sync(&pool, vec![edited], at(2, 10)).await, (0, 0, 0));

    let stored = pull_requests::get_pull_request(&pool, &original.key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Change 5");
    assert!(!stored.draft);
}
