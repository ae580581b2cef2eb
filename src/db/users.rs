//! User queries.
//!
//! User records belong to the team management flow; the assignment engine
//! only reads them, apart from the active flag toggle that triggers
//! rebalancing.

use crate::db::pool::DbPool;
use crate::db::{is_foreign_key_violation, now};
use crate::error::AppError;
use crate::models::{User, UserAssignmentStat};
use crate::selection;
use sqlx::{Executor, Sqlite};

const USER_COLUMNS: &str = "id, name, is_active, team_id, created_at";

/// Get a user by id.
///
/// # Returns
/// The user, or `NotFound` if no such user exists.
pub async fn get_by_id<'e, E>(executor: E, user_id: &str) -> Result<User, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::internal_with_source("failed to get user by id", e))?;

    user.ok_or_else(|| AppError::not_found_with_id("User", user_id))
}

/// Get all members of a team, ordered by id.
pub async fn get_by_team<'e, E>(executor: E, team_name: &str) -> Result<Vec<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE team_id = ? ORDER BY id",
        USER_COLUMNS
    ))
    .bind(team_name)
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::internal_with_source("failed to get users by team", e))
}

/// Insert a user, or update name, flag and team of an existing one.
pub async fn upsert<'e, E>(executor: E, user: &User) -> Result<User, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, name, is_active, team_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            is_active = excluded.is_active,
            team_id = excluded.team_id
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&user.id)
    .bind(&user.name)
    .bind(user.is_active)
    .bind(&user.team_id)
    .bind(now())
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::not_found_with_id("Team", user.team_id.clone())
        } else {
            AppError::internal_with_source(format!("failed to save user '{}'", user.id), e)
        }
    })
}

/// Set the active flag of a user.
///
/// # Returns
/// The updated user, or `NotFound` if no such user exists.
pub async fn set_is_active(pool: &DbPool, user_id: &str, is_active: bool) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = ? WHERE id = ? RETURNING {}",
        USER_COLUMNS
    ))
    .bind(is_active)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::internal_with_source("failed to set user active status", e))?;

    user.ok_or_else(|| AppError::not_found_with_id("User", user_id))
}

/// Ids of every user eligible to review a pull request by `author_id`.
///
/// Reads the author and their team from one snapshot. Candidates are
/// returned unshuffled; the caller draws from them.
pub async fn get_active_team_candidate_ids(
    pool: &DbPool,
    author_id: &str,
) -> Result<Vec<String>, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::internal_with_source("failed to begin transaction", e))?;

    let author = get_by_id(&mut *tx, author_id).await?;
    let team = get_by_team(&mut *tx, &author.team_id).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::internal_with_source("failed to commit transaction", e))?;

    Ok(selection::eligible_ids(&author, &team))
}

/// Reviewer link count per user, busiest first.
pub async fn get_assignment_stats(pool: &DbPool) -> Result<Vec<UserAssignmentStat>, AppError> {
    sqlx::query_as::<_, UserAssignmentStat>(
        r#"
        SELECT
            u.id AS user_id,
            u.name AS username,
            COUNT(r.reviewer_id) AS assignment_count
        FROM users u
        LEFT JOIN pr_reviewers r ON r.reviewer_id = u.id
        GROUP BY u.id, u.name
        ORDER BY assignment_count DESC, u.name ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::internal_with_source("failed to get user assignment stats", e))
}
