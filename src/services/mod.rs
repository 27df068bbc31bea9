//! Business logic services.
//!
//! The reconciler, change detector and CI classifier are pure; the GitHub
//! client and sync engine wrap them with network and storage access.

pub mod change_detection;
pub mod ci_status;
pub mod github_client;
pub mod reconciler;
pub mod sync_engine;
pub mod transform;

pub use change_detection::{detect_changes, ChangeSet};
pub use ci_status::classify_ci_status;
pub use github_client::{GitHubClient, GitHubClientConfig};
pub use reconciler::{reconcile, Reconciliation};
pub use sync_engine::{SyncConfig, SyncEngine, SyncResult};
