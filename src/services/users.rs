//! User service.
//!
//! Flipping a user's active flag is the trigger for rebalancing: after the
//! update commits, an event is published without waiting on the worker.

use crate::db::pool::DbPool;
use crate::db::users;
use crate::error::AppError;
use crate::logging::SharedLogger;
use crate::models::{PullRequestShort, User};
use crate::services::assignment::AssignmentService;
use crate::services::rebalance_queue::{RebalanceEvent, RebalancePublisher};
use serde::Serialize;

/// A user's current review load.
#[derive(Debug, Clone, Serialize)]
pub struct UserReviews {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}

#[derive(Clone)]
pub struct UserService {
    pool: DbPool,
    assignment: AssignmentService,
    publisher: RebalancePublisher,
    logger: SharedLogger,
}

impl UserService {
    pub fn new(
        pool: DbPool,
        assignment: AssignmentService,
        publisher: RebalancePublisher,
        logger: SharedLogger,
    ) -> Self {
        Self {
            pool,
            assignment,
            publisher,
            logger,
        }
    }

    /// Set the active flag and schedule a rebalance for the user.
    ///
    /// A dropped rebalance event does not fail the call.
    pub async fn set_is_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::invalid_input_field("user id must not be empty", "user_id"));
        }

        let user = users::set_is_active(&self.pool, user_id, is_active)
            .await
            .map_err(|e| self.fail("set user active flag", e))?;

        self.logger.info(&format!("User {} is_active set to {}", user.id, user.is_active));
        self.publisher.publish(RebalanceEvent::new(user.id.clone(), is_active));

        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        users::get_by_id(&self.pool, user_id)
            .await
            .map_err(|e| self.fail("get user", e))
    }

    /// Pull requests the user reviews. `NotFound` for an unknown user.
    pub async fn get_user_reviews(&self, user_id: &str) -> Result<UserReviews, AppError> {
        let user = self.get_user(user_id).await?;
        let pull_requests = self.assignment.get_user_reviews(&user.id).await?;

        Ok(UserReviews {
            user_id: user.id,
            pull_requests,
        })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{initialize, teams};
    use crate::logging::MemoryLogger;
    use crate::models::TeamMember;
    use crate::services::rebalance_queue;
    use log::Level;
    use tempfile::tempdir;

    fn member(id: &str, active: bool) -> TeamMember {
        TeamMember {
            user_id: id.to_string(),
            username: id.to_uppercase(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_set_is_active_publishes_event() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db")).await.unwrap();
        teams::create_with_members(&pool, "backend", &[member("a", true)]).await.unwrap();

        let logger = MemoryLogger::new();
        let (publisher, mut rx) = rebalance_queue::channel(1, logger.clone());
        let assignment = AssignmentService::new(pool.clone(), logger.clone());
        let service = UserService::new(pool, assignment, publisher, logger.clone());

        let user = service.set_is_active("a", false).await.unwrap();
        assert!(!user.is_active);
        assert_eq!(rx.try_recv().unwrap(), RebalanceEvent::new("a", false));

        // Fill the queue, then flip again: the update still succeeds.
        service.set_is_active("a", true).await.unwrap();
        let user = service.set_is_active("a", false).await.unwrap();
        assert!(!user.is_active);
        assert_eq!(logger.messages_at(Level::Warn).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db")).await.unwrap();
        let logger = MemoryLogger::new();
        let (publisher, mut rx) = rebalance_queue::channel(4, logger.clone());
        let assignment = AssignmentService::new(pool.clone(), logger.clone());
        let service = UserService::new(pool, assignment, publisher, logger);

        let err = service.set_is_active("ghost", true).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(rx.try_recv().is_err());

        let err = service.get_user_reviews("ghost").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_storage_failure_is_logged_and_not_published() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db")).await.unwrap();
        teams::create_with_members(&pool, "backend", &[member("a", true)]).await.unwrap();

        let logger = MemoryLogger::new();
        let (publisher, mut rx) = rebalance_queue::channel(4, logger.clone());
        let assignment = AssignmentService::new(pool.clone(), logger.clone());
        let service = UserService::new(pool.clone(), assignment, publisher, logger.clone());

        pool.close().await;

        let err = service.set_is_active("a", false).await.unwrap_err();
        assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
        assert!(rx.try_recv().is_err());

        let errors = logger.messages_at(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("failed to set user active flag"));
    }
}
