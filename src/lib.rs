//! PR Tracker - local tracking of GitHub pull requests by selected authors.
//!
//! Open pull requests of tracked repositories are synced into SQLite. Each
//! sync is reconciled against the stored set so that only relevant changes
//! (new comments, new commits, CI transitions) rewrite a record, and the
//! user's acknowledgment survives every sync.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::AppError;
