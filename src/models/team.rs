//! Team model.

use super::user::User;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team, identified by its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Team {
    pub name: String,
    pub created_at: i64,
}

/// Member data supplied when creating a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl From<&User> for TeamMember {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.name.clone(),
            is_active: user.is_active,
        }
    }
}

/// A team together with its current members.
#[derive(Debug, Clone, Serialize)]
pub struct TeamWithMembers {
    pub team: Team,
    pub members: Vec<User>,
}
