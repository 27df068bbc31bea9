//! Authenticated GitHub user model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The single GitHub account the tracker syncs as.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// GitHub login.
    pub username: String,

    /// Personal access token used for API requests.
    #[serde(skip_serializing)]
    pub access_token: String,

    /// When the user authenticated (Unix).
    pub created_at: i64,
}
