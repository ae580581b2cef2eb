//! Team queries.

use crate::db::pool::DbPool;
use crate::db::{is_unique_violation, now, users};
use crate::error::AppError;
use crate::models::{Team, TeamMember, TeamWithMembers, User};

/// Create a team and upsert its members in one transaction.
///
/// # Returns
/// The team with its members, or `TeamAlreadyExists` if the name is taken.
pub async fn create_with_members(
    pool: &DbPool,
    team_name: &str,
    members: &[TeamMember],
) -> Result<TeamWithMembers, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::internal_with_source("failed to begin transaction", e))?;

    let team = sqlx::query_as::<_, Team>(
        "INSERT INTO teams (name, created_at) VALUES (?, ?) RETURNING name, created_at",
    )
    .bind(team_name)
    .bind(now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::team_exists(team_name)
        } else {
            AppError::internal_with_source("failed to create team", e)
        }
    })?;

    let mut created = Vec::with_capacity(members.len());
    for member in members {
        let user = User {
            id: member.user_id.clone(),
            name: member.username.clone(),
            is_active: member.is_active,
            team_id: team.name.clone(),
            created_at: 0,
        };
        created.push(users::upsert(&mut *tx, &user).await?);
    }

    tx.commit()
        .await
        .map_err(|e| AppError::internal_with_source("failed to commit transaction", e))?;

    Ok(TeamWithMembers {
        team,
        members: created,
    })
}

/// Get a team with its members.
///
/// # Returns
/// The team, or `NotFound` if no team has this name.
pub async fn get(pool: &DbPool, team_name: &str) -> Result<TeamWithMembers, AppError> {
    let team = sqlx::query_as::<_, Team>("SELECT name, created_at FROM teams WHERE name = ?")
        .bind(team_name)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::internal_with_source("failed to get team", e))?
        .ok_or_else(|| AppError::not_found_with_id("Team", team_name))?;

    let members = users::get_by_team(pool, team_name).await?;

    Ok(TeamWithMembers { team, members })
}
