//! Assignment statistics.

use crate::db::pool::DbPool;
use crate::db::users;
use crate::error::AppError;
use crate::models::UserAssignmentStat;

#[derive(Clone)]
pub struct StatisticsService {
    pool: DbPool,
}

impl StatisticsService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Reviewer link count per user, busiest first, ties by name.
    pub async fn user_assignment_stats(&self) -> Result<Vec<UserAssignmentStat>, AppError> {
        users::get_assignment_stats(&self.pool)
            .await
            .map_err(|e| e.with_context("failed to load assignment statistics"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{initialize, pull_requests, teams};
    use crate::models::{NewPullRequest, TeamMember};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_stats_ordering() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db")).await.unwrap();
        let members: Vec<TeamMember> = ["a", "b", "c"]
            .iter()
            .map(|id| TeamMember {
                user_id: id.to_string(),
                username: id.to_uppercase(),
                is_active: true,
            })
            .collect();
        teams::create_with_members(&pool, "backend", &members).await.unwrap();

        let reviewers = vec!["c".to_string()];
        pull_requests::create_with_reviewers(&pool, &NewPullRequest::new("p1", "One", "a"), &reviewers)
            .await
            .unwrap();
        pull_requests::create_with_reviewers(&pool, &NewPullRequest::new("p2", "Two", "b"), &reviewers)
            .await
            .unwrap();

        let stats = StatisticsService::new(pool).user_assignment_stats().await.unwrap();
        let rows: Vec<(&str, i64)> = stats
            .iter()
            .map(|s| (s.user_id.as_str(), s.assignment_count))
            .collect();
        assert_eq!(rows, vec![("c", 2), ("a", 0), ("b", 0)]);
    }
}
