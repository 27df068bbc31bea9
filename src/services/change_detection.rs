//! Decides whether a freshly fetched pull request differs from the stored
//! copy in a way worth persisting.

use crate::models::PullRequest;

/// Result of comparing a stored record with its fresh counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    /// `ci_status` differs.
    pub ci_status_changed: bool,

    /// CI status, last comment time, or last commit time differs.
    pub has_relevant_change: bool,
}

/// Compare two records that share the same identity.
///
/// Title, draft flag, reviewers and upstream timestamps are ignored: cosmetic
/// edits alone never produce an update.
pub fn detect_changes(stored: &PullRequest, fresh: &PullRequest) -> ChangeSet {
    let ci_status_changed = stored.ci_status != fresh.ci_status;
    let comment_changed = stored.last_comment_at != fresh.last_comment_at;
    let commit_changed = stored.last_commit_at != fresh.last_commit_at;

    ChangeSet {
        ci_status_changed,
        has_relevant_change: ci_status_changed || comment_changed || commit_changed,
    }
}
