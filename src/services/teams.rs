//! Team service.

use crate::db::pool::DbPool;
use crate::db::teams;
use crate::error::AppError;
use crate::logging::SharedLogger;
use crate::models::{TeamMember, TeamWithMembers};
use std::collections::HashSet;

#[derive(Clone)]
pub struct TeamService {
    pool: DbPool,
    logger: SharedLogger,
}

impl TeamService {
    pub fn new(pool: DbPool, logger: SharedLogger) -> Self {
        Self { pool, logger }
    }

    /// Create a team and upsert its members.
    ///
    /// A member that already exists in another team is moved to this one.
    pub async fn create_team(
        &self,
        team_name: &str,
        members: &[TeamMember],
    ) -> Result<TeamWithMembers, AppError> {
        validate(team_name, members)?;

        let team = teams::create_with_members(&self.pool, team_name, members)
            .await
            .map_err(|e| e.with_context("failed to create team"))?;

        self.logger.info(&format!(
            "Created team {} with {} member(s)",
            team.team.name,
            team.members.len()
        ));
        Ok(team)
    }

    pub async fn get_team(&self, team_name: &str) -> Result<TeamWithMembers, AppError> {
        teams::get(&self.pool, team_name).await
    }
}

fn validate(team_name: &str, members: &[TeamMember]) -> Result<(), AppError> {
    if team_name.trim().is_empty() {
        return Err(AppError::invalid_input_field("team name must not be empty", "team_name"));
    }

    let mut seen = HashSet::new();
    for member in members {
        if member.user_id.trim().is_empty() {
            return Err(AppError::invalid_input_field("user id must not be empty", "user_id"));
        }
        if member.username.trim().is_empty() {
            return Err(AppError::invalid_input_field("username must not be empty", "username"));
        }
        if !seen.insert(member.user_id.as_str()) {
            return Err(AppError::invalid_input_field(
                format!("user '{}' listed twice", member.user_id),
                "members",
            ));
        }
    }
    Ok(())
}
