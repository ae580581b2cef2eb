//! Pull request queries.
//!
//! Every mutating operation runs in a single transaction whose first
//! statement writes to the pull request rows it is about to inspect. SQLite
//! takes the database write lock on that statement, so the reads that follow
//! see the latest committed state and no other writer can interleave until
//! commit. Readers are never blocked (WAL).
//!
//! `need_more_reviewers` is always recomputed from the live link count
//! inside the same transaction that changed the links.

use crate::db::pool::DbPool;
use crate::db::{is_foreign_key_violation, is_unique_violation, now, QueryContext};
use crate::error::AppError;
use crate::models::{
    NewPullRequest, PullRequest, PullRequestRow, PullRequestShort, PullRequestStatus,
    ReassignOutcome, ReviewerBackfill, MAX_REVIEWERS,
};
use crate::selection;
use sqlx::{Executor, Sqlite, SqliteConnection, Transaction};

const PR_COLUMNS: &str = "id, name, author_id, status, need_more_reviewers, created_at, merged_at";

async fn begin(pool: &DbPool) -> Result<Transaction<'static, Sqlite>, AppError> {
    pool.begin().await.context("failed to begin transaction")
}

async fn commit(tx: Transaction<'static, Sqlite>) -> Result<(), AppError> {
    tx.commit().await.context("failed to commit transaction")
}

/// Take the write lock and read one pull request.
///
/// The no-op update is what acquires the lock; it must stay the first
/// statement of the transaction.
async fn lock_pull_request(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
) -> Result<Option<PullRequestRow>, AppError> {
    sqlx::query_as::<_, PullRequestRow>(&format!(
        "UPDATE pull_requests SET updated_at = updated_at WHERE id = ? RETURNING {}",
        PR_COLUMNS
    ))
    .bind(pull_request_id)
    .fetch_optional(&mut *conn)
    .await
    .context("failed to lock pull request")
}

/// Reviewer ids of a pull request, in assignment order.
async fn reviewer_ids<'e, E>(executor: E, pull_request_id: &str) -> Result<Vec<String>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, String>(
        "SELECT reviewer_id FROM pr_reviewers WHERE pull_request_id = ? ORDER BY assigned_at, reviewer_id",
    )
    .bind(pull_request_id)
    .fetch_all(executor)
    .await
    .context("failed to get reviewers")
}

async fn reviewer_count(conn: &mut SqliteConnection, pull_request_id: &str) -> Result<usize, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pr_reviewers WHERE pull_request_id = ?")
            .bind(pull_request_id)
            .fetch_one(&mut *conn)
            .await
            .context("failed to count reviewers")?;
    Ok(count.max(0) as usize)
}

async fn insert_link(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
    reviewer_id: &str,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO pr_reviewers (pull_request_id, reviewer_id, assigned_at) VALUES (?, ?, ?)")
        .bind(pull_request_id)
        .bind(reviewer_id)
        .bind(now())
        .execute(&mut *conn)
        .await
        .context("failed to assign reviewer")?;
    Ok(())
}

/// Recompute `need_more_reviewers` from the live link count and bump `updated_at`.
async fn touch_and_refresh(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
) -> Result<PullRequestRow, AppError> {
    sqlx::query_as::<_, PullRequestRow>(&format!(
        r#"
        UPDATE pull_requests SET
            need_more_reviewers = (
                status = 'OPEN'
                AND (SELECT COUNT(*) FROM pr_reviewers WHERE pull_request_id = pull_requests.id) < ?
            ),
            updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        PR_COLUMNS
    ))
    .bind(MAX_REVIEWERS as i64)
    .bind(now())
    .bind(pull_request_id)
    .fetch_one(&mut *conn)
    .await
    .context("failed to refresh pull request")
}

/// Users that could fill a reviewer slot on the pull request.
///
/// Active members of the author's team, excluding the author, everyone
/// already on the pull request and `excluded_id`.
async fn replacement_candidates(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
    excluded_id: &str,
) -> Result<Vec<String>, AppError> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT u.id
        FROM users u
        JOIN pull_requests pr ON pr.id = ?
        JOIN users a ON a.id = pr.author_id
        WHERE u.team_id = a.team_id
          AND u.is_active = 1
          AND u.id != pr.author_id
          AND u.id != ?
          AND u.id NOT IN (SELECT reviewer_id FROM pr_reviewers WHERE pull_request_id = ?)
        ORDER BY u.id
        "#,
    )
    .bind(pull_request_id)
    .bind(excluded_id)
    .bind(pull_request_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to find replacement candidates")
}

/// Insert a pull request together with its initial reviewer links.
///
/// Each reviewer is re-checked against the author's team and the active flag
/// at insert time; one that no longer qualifies fails the whole creation
/// with `NotFound` and nothing is written.
pub async fn create_with_reviewers(
    pool: &DbPool,
    new_pr: &NewPullRequest,
    reviewer_ids: &[String],
) -> Result<PullRequest, AppError> {
    if reviewer_ids.len() > MAX_REVIEWERS {
        return Err(AppError::invalid_input(format!(
            "at most {} reviewers can be assigned",
            MAX_REVIEWERS
        )));
    }

    let mut tx = begin(pool).await?;
    let created_at = now();

    let row = sqlx::query_as::<_, PullRequestRow>(&format!(
        r#"
        INSERT INTO pull_requests (id, name, author_id, status, need_more_reviewers, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        PR_COLUMNS
    ))
    .bind(&new_pr.id)
    .bind(&new_pr.name)
    .bind(&new_pr.author_id)
    .bind(PullRequestStatus::Open.as_str())
    .bind(PullRequestStatus::Open.needs_more_reviewers(reviewer_ids.len()))
    .bind(created_at)
    .bind(created_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::pull_request_exists(new_pr.id.clone())
        } else if is_foreign_key_violation(&e) {
            AppError::not_found_with_id("User", new_pr.author_id.clone())
        } else {
            AppError::internal_with_source("failed to create pull request", e)
        }
    })?;

    for reviewer_id in reviewer_ids {
        let inserted = sqlx::query(
            r#"
            INSERT INTO pr_reviewers (pull_request_id, reviewer_id, assigned_at)
            SELECT ?, u.id, ?
            FROM users u
            JOIN users a ON a.id = ?
            WHERE u.id = ?
              AND u.id != a.id
              AND u.team_id = a.team_id
              AND u.is_active = 1
            "#,
        )
        .bind(&new_pr.id)
        .bind(created_at)
        .bind(&new_pr.author_id)
        .bind(reviewer_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::invalid_input_field(
                    format!("reviewer '{}' listed twice", reviewer_id),
                    "assigned_reviewers",
                )
            } else {
                AppError::internal_with_source("failed to assign reviewer", e)
            }
        })?
        .rows_affected();

        if inserted == 0 {
            return Err(AppError::not_found_with_id("Reviewer", reviewer_id.clone()));
        }
    }

    commit(tx).await?;

    Ok(row.into_pull_request(reviewer_ids.to_vec()))
}

/// Get a pull request with its reviewers.
pub async fn get_by_id(pool: &DbPool, pull_request_id: &str) -> Result<PullRequest, AppError> {
    let mut tx = begin(pool).await?;

    let row = sqlx::query_as::<_, PullRequestRow>(&format!(
        "SELECT {} FROM pull_requests WHERE id = ?",
        PR_COLUMNS
    ))
    .bind(pull_request_id)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to get pull request")?
    .ok_or_else(|| AppError::not_found_with_id("PullRequest", pull_request_id))?;

    let reviewers = reviewer_ids(&mut *tx, pull_request_id).await?;
    commit(tx).await?;

    Ok(row.into_pull_request(reviewers))
}

/// Mark an open pull request as merged.
///
/// # Returns
/// The merged pull request, `NotFound`, or `PrMerged` if it was merged already.
pub async fn merge(pool: &DbPool, pull_request_id: &str) -> Result<PullRequest, AppError> {
    let mut tx = begin(pool).await?;

    let current = lock_pull_request(&mut tx, pull_request_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("PullRequest", pull_request_id))?;

    if current.status_enum() == PullRequestStatus::Merged {
        return Err(AppError::pr_merged(pull_request_id));
    }

    let merged_at = now();
    let row = sqlx::query_as::<_, PullRequestRow>(&format!(
        r#"
        UPDATE pull_requests
        SET status = ?, need_more_reviewers = 0, merged_at = ?, updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        PR_COLUMNS
    ))
    .bind(PullRequestStatus::Merged.as_str())
    .bind(merged_at)
    .bind(merged_at)
    .bind(pull_request_id)
    .fetch_one(&mut *tx)
    .await
    .context("failed to merge pull request")?;

    let reviewers = reviewer_ids(&mut *tx, pull_request_id).await?;
    commit(tx).await?;

    Ok(row.into_pull_request(reviewers))
}

/// Swap `old_reviewer_id` for a random eligible user.
///
/// Checks run in order: existence, open status, current assignment, then
/// candidate availability. Any failure leaves the pull request untouched.
pub async fn reassign(
    pool: &DbPool,
    pull_request_id: &str,
    old_reviewer_id: &str,
) -> Result<ReassignOutcome, AppError> {
    let mut tx = begin(pool).await?;

    let current = lock_pull_request(&mut tx, pull_request_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("PullRequest", pull_request_id))?;

    if current.status_enum() == PullRequestStatus::Merged {
        return Err(AppError::pr_merged(pull_request_id));
    }

    let reviewers = reviewer_ids(&mut *tx, pull_request_id).await?;
    if !reviewers.iter().any(|r| r == old_reviewer_id) {
        return Err(AppError::not_assigned(pull_request_id, old_reviewer_id));
    }

    let candidates = replacement_candidates(&mut tx, pull_request_id, old_reviewer_id).await?;
    let new_reviewer_id = selection::pick_one(&candidates).ok_or_else(|| {
        AppError::no_candidate(format!(
            "no active replacement candidate in team for pull request '{}'",
            pull_request_id
        ))
    })?;

    sqlx::query("DELETE FROM pr_reviewers WHERE pull_request_id = ? AND reviewer_id = ?")
        .bind(pull_request_id)
        .bind(old_reviewer_id)
        .execute(&mut *tx)
        .await
        .context("failed to remove reviewer")?;

    insert_link(&mut tx, pull_request_id, &new_reviewer_id).await?;
    let row = touch_and_refresh(&mut tx, pull_request_id).await?;
    let reviewers = reviewer_ids(&mut *tx, pull_request_id).await?;

    commit(tx).await?;

    Ok(ReassignOutcome {
        pull_request: row.into_pull_request(reviewers),
        new_reviewer_id,
    })
}

/// Pull requests the user is a reviewer on, oldest first.
pub async fn get_user_reviews(pool: &DbPool, user_id: &str) -> Result<Vec<PullRequestShort>, AppError> {
    sqlx::query_as::<_, PullRequestShort>(
        r#"
        SELECT pr.id, pr.name, pr.author_id, pr.status
        FROM pull_requests pr
        JOIN pr_reviewers r ON r.pull_request_id = pr.id
        WHERE r.reviewer_id = ?
        ORDER BY pr.created_at, pr.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to get user reviews")
}

/// Add an activated user to every open, understaffed pull request of their team.
///
/// Skips pull requests the user wrote or already reviews. Does nothing if
/// the user is inactive again by the time this runs.
///
/// # Returns
/// Ids of the pull requests the user was added to.
pub async fn assign_to_needy_prs(pool: &DbPool, user_id: &str) -> Result<Vec<String>, AppError> {
    let mut tx = begin(pool).await?;

    let mut needy: Vec<String> = sqlx::query_scalar(
        r#"
        UPDATE pull_requests SET updated_at = updated_at
        WHERE status = 'OPEN'
          AND need_more_reviewers = 1
          AND author_id != ?
          AND author_id IN (
              SELECT id FROM users WHERE team_id = (SELECT team_id FROM users WHERE id = ?)
          )
          AND id NOT IN (SELECT pull_request_id FROM pr_reviewers WHERE reviewer_id = ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await
    .context("failed to lock understaffed pull requests")?;
    needy.sort();

    let is_active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to get user")?;

    match is_active {
        None => return Err(AppError::not_found_with_id("User", user_id)),
        Some(false) => return Ok(Vec::new()),
        Some(true) => {}
    }

    let mut assigned = Vec::with_capacity(needy.len());
    for pull_request_id in needy {
        if reviewer_count(&mut tx, &pull_request_id).await? < MAX_REVIEWERS {
            insert_link(&mut tx, &pull_request_id, user_id).await?;
            assigned.push(pull_request_id.clone());
        }
        touch_and_refresh(&mut tx, &pull_request_id).await?;
    }

    commit(tx).await?;

    Ok(assigned)
}

/// Remove a deactivated user from every open pull request and backfill each slot.
///
/// Replacements come from the author's team and never include the removed
/// user. Slots that cannot be filled leave the pull request flagged as
/// needing reviewers.
pub async fn reassign_from_all_prs(
    pool: &DbPool,
    user_id: &str,
) -> Result<Vec<ReviewerBackfill>, AppError> {
    let mut tx = begin(pool).await?;

    let mut affected: Vec<String> = sqlx::query_scalar(
        r#"
        DELETE FROM pr_reviewers
        WHERE reviewer_id = ?
          AND pull_request_id IN (SELECT id FROM pull_requests WHERE status = 'OPEN')
        RETURNING pull_request_id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await
    .context("failed to remove reviewer from open pull requests")?;
    affected.sort();
    affected.dedup();

    let mut backfills = Vec::with_capacity(affected.len());
    for pull_request_id in affected {
        let candidates = replacement_candidates(&mut tx, &pull_request_id, user_id).await?;
        let replacement_id = selection::pick_one(&candidates);

        if let Some(new_id) = &replacement_id {
            insert_link(&mut tx, &pull_request_id, new_id).await?;
        }
        touch_and_refresh(&mut tx, &pull_request_id).await?;

        backfills.push(ReviewerBackfill {
            pull_request_id,
            replacement_id,
        });
    }

    commit(tx).await?;

    Ok(backfills)
}
