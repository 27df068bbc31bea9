//! CI status classification.
//!
//! Collapses check runs and the legacy combined commit status into one
//! `CiStatus`. Check runs take precedence: a failing run wins over
//! everything, and a run still in flight suppresses a combined "success".

use crate::models::{CheckRun, CiStatus, CombinedState};

/// Classify the CI state of a commit.
///
/// Precedence, first match wins:
/// 1. any check run with a failing conclusion -> `Failure`
/// 2. any check run still outstanding -> `Pending`
/// 3. the combined state: success -> `Success`, failure/error -> `Failure`,
///    anything else -> `Pending`
pub fn classify_ci_status(check_runs: &[CheckRun], combined: CombinedState) -> CiStatus {
    if check_runs
        .iter()
        .any(|run| run.conclusion.is_some_and(|c| c.is_failing()))
    {
        return CiStatus::Failure;
    }

    if check_runs.iter().any(|run| run.status.is_outstanding()) {
        return CiStatus::Pending;
    }

    match combined {
        CombinedState::Success => CiStatus::Success,
        CombinedState::Failure | CombinedState::Error => CiStatus::Failure,
        CombinedState::Pending | CombinedState::Unknown => CiStatus::Pending,
    }
}
