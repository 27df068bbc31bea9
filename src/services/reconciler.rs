//! Reconciliation of stored pull requests against a fresh sync.
//!
//! `reconcile` partitions one sync cycle into records to insert, records to
//! update and records to delete. It never mutates the stored set; updated
//! records are new values built from the fresh fields plus the two local-only
//! fields carried over from storage.

use crate::models::{PrKey, PullRequest};
use crate::services::change_detection::detect_changes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Output of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Present upstream, unknown locally.
    pub new: Vec<PullRequest>,

    /// Known locally and relevantly changed upstream.
    pub updated: Vec<PullRequest>,

    /// Known locally, no longer observed upstream.
    pub removed: Vec<PullRequest>,
}

impl Reconciliation {
    /// True when the pass requires no writes.
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Classify `fresh` against `stored`.
///
/// Fresh records with no relevant change are dropped: the stored copy stays
/// authoritative, including fields such as the title that may have drifted.
/// When both inputs repeat a key, the later stored entry wins the index slot.
pub fn reconcile<I>(stored: &[PullRequest], fresh: I, now: DateTime<Utc>) -> Reconciliation
where
    I: IntoIterator<Item = PullRequest>,
{
    let index: HashMap<PrKey, &PullRequest> = stored.iter().map(|pr| (pr.key(), pr)).collect();
    let mut seen: HashSet<PrKey> = HashSet::with_capacity(index.len());
    let mut result = Reconciliation::default();

    for pr in fresh {
        let key = pr.key();
        let existing = index.get(&key).copied();
        seen.insert(key);

        let Some(existing) = existing else {
            result.new.push(pr);
            continue;
        };

        let changes = detect_changes(existing, &pr);
        if !changes.has_relevant_change {
            continue;
        }

        let last_ci_status_update_at = if changes.ci_status_changed {
            Some(now)
        } else {
            existing.last_ci_status_update_at
        };

        result.updated.push(PullRequest {
            last_acknowledged_at: existing.last_acknowledged_at,
            last_ci_status_update_at,
            ..pr
        });
    }

    result.removed = stored
        .iter()
        .filter(|pr| !seen.contains(&pr.key()))
        .cloned()
        .collect();

    result
}
