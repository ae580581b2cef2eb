//! Pull request assignment service.
//!
//! Orchestrates creation, merge and reassignment of pull requests on top of
//! the transactional queries in [`crate::db::pull_requests`]. Domain errors
//! pass through unchanged; internal failures get the operation name added
//! as context and are logged once here.

use crate::db::pool::DbPool;
use crate::db::{pull_requests, users};
use crate::error::AppError;
use crate::logging::SharedLogger;
use crate::models::{NewPullRequest, PullRequest, PullRequestShort, ReassignOutcome};
use crate::selection;

#[derive(Clone)]
pub struct AssignmentService {
    pool: DbPool,
    logger: SharedLogger,
}

impl AssignmentService {
    pub fn new(pool: DbPool, logger: SharedLogger) -> Self {
        Self { pool, logger }
    }

    /// Create an open pull request with up to two reviewers from the author's team.
    ///
    /// Having no eligible teammate is not an error: the pull request is
    /// created without reviewers and flagged as needing more.
    pub async fn create_pull_request(&self, new_pr: NewPullRequest) -> Result<PullRequest, AppError> {
        new_pr.validate()?;

        let candidates = users::get_active_team_candidate_ids(&self.pool, &new_pr.author_id)
            .await
            .map_err(|e| self.fail("create pull request", e))?;
        let reviewers = selection::pick_reviewers(&candidates);

        let pr = pull_requests::create_with_reviewers(&self.pool, &new_pr, &reviewers)
            .await
            .map_err(|e| self.fail("create pull request", e))?;

        self.logger.info(&format!(
            "Created pull request {} by {} with reviewers [{}]",
            pr.id,
            pr.author_id,
            pr.assigned_reviewers.join(", ")
        ));

        Ok(pr)
    }

    /// Merge an open pull request. Merging twice fails with `PrMerged`.
    pub async fn merge(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        require("pull_request_id", pull_request_id)?;

        let pr = pull_requests::merge(&self.pool, pull_request_id)
            .await
            .map_err(|e| self.fail("merge pull request", e))?;

        self.logger.info(&format!("Merged pull request {}", pr.id));
        Ok(pr)
    }

    /// Replace one reviewer of an open pull request with a random eligible teammate.
    pub async fn reassign(
        &self,
        pull_request_id: &str,
        old_reviewer_id: &str,
    ) -> Result<ReassignOutcome, AppError> {
        require("pull_request_id", pull_request_id)?;
        require("old_user_id", old_reviewer_id)?;

        let outcome = pull_requests::reassign(&self.pool, pull_request_id, old_reviewer_id)
            .await
            .map_err(|e| self.fail("reassign reviewer", e))?;

        self.logger.info(&format!(
            "Reassigned pull request {}: {} -> {}",
            pull_request_id, old_reviewer_id, outcome.new_reviewer_id
        ));

        Ok(outcome)
    }

    /// Pull requests the user currently reviews.
    pub async fn get_user_reviews(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AppError> {
        pull_requests::get_user_reviews(&self.pool, user_id)
            .await
            .map_err(|e| self.fail("get user reviews", e))
    }

    pub async fn get_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        pull_requests::get_by_id(&self.pool, pull_request_id)
            .await
            .map_err(|e| self.fail("get pull request", e))
    }

    fn fail(&self, operation: &str, err: AppError) -> AppError {
        if err.is_domain() {
            return err;
        }
        let err = err.with_context(format!("failed to {}", operation));
        self.logger.error(&err.to_string());
        err
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            format!("{} must not be empty", field),
            field,
        ));
    }
    Ok(())
}
