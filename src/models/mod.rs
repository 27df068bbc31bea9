//! Data models for the application.
//!
//! These models represent the entities stored in the local SQLite database.
//! `PullRequest` is the unit the reconciliation core works on; its row
//! mapping lives in `db::pull_requests`.

pub mod ci_status;
pub mod pull_request;
pub mod user;

// Re-exports for convenient access
pub use ci_status::{CheckRun, CheckRunConclusion, CheckRunStatus, CiStatus, CombinedState};
pub use pull_request::{PrKey, PrUpdate, PullRequest};
pub use user::User;
