//! CI status model and the raw check-run vocabulary it is derived from.

use serde::{Deserialize, Serialize};

/// Coarse CI state of a pull request's head commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiStatus {
    #[default]
    Pending,
    Success,
    Failure,
}

impl From<&str> for CiStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "success" => Self::Success,
            "failure" => Self::Failure,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for CiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Lifecycle status of a check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRunStatus {
    Queued,
    InProgress,
    Waiting,
    Requested,
    Pending,
    Completed,
    Other,
}

impl CheckRunStatus {
    /// Whether the run has not produced a conclusion yet.
    pub fn is_outstanding(self) -> bool {
        matches!(
            self,
            Self::Queued | Self::InProgress | Self::Waiting | Self::Requested | Self::Pending
        )
    }
}

impl From<&str> for CheckRunStatus {
    fn from(s: &str) -> Self {
        match s {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "waiting" => Self::Waiting,
            "requested" => Self::Requested,
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            _ => Self::Other,
        }
    }
}

/// Final conclusion of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRunConclusion {
    Success,
    Failure,
    TimedOut,
    Cancelled,
    StartupFailure,
    ActionRequired,
    Stale,
    Neutral,
    Skipped,
    Other,
}

impl CheckRunConclusion {
    /// Conclusions that mark the whole commit as failed.
    pub fn is_failing(self) -> bool {
        matches!(
            self,
            Self::Failure
                | Self::TimedOut
                | Self::Cancelled
                | Self::StartupFailure
                | Self::ActionRequired
                | Self::Stale
        )
    }
}

impl From<&str> for CheckRunConclusion {
    fn from(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "timed_out" => Self::TimedOut,
            "cancelled" => Self::Cancelled,
            "startup_failure" => Self::StartupFailure,
            "action_required" => Self::ActionRequired,
            "stale" => Self::Stale,
            "neutral" => Self::Neutral,
            "skipped" => Self::Skipped,
            _ => Self::Other,
        }
    }
}

/// The parts of a check run that matter for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckRun {
    pub status: CheckRunStatus,
    pub conclusion: Option<CheckRunConclusion>,
}

impl CheckRun {
    /// Build from the raw API strings. An empty conclusion means none yet.
    pub fn from_raw(status: &str, conclusion: Option<&str>) -> Self {
        Self {
            status: CheckRunStatus::from(status),
            conclusion: conclusion
                .filter(|c| !c.is_empty())
                .map(CheckRunConclusion::from),
        }
    }
}

/// Legacy combined commit status rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinedState {
    Success,
    Failure,
    Error,
    Pending,
    Unknown,
}

impl From<&str> for CombinedState {
    fn from(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "error" => Self::Error,
            "pending" => Self::Pending,
            _ => Self::Unknown,
        }
    }
}
