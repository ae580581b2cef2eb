//! User model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team member who may author pull requests and review them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Only active users are picked as reviewers.
    pub is_active: bool,
    /// Name of the owning team.
    pub team_id: String,
    /// Creation timestamp (Unix).
    pub created_at: i64,
}

/// Number of reviewer links currently held by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct UserAssignmentStat {
    pub user_id: String,
    pub username: String,
    pub assignment_count: i64,
}
