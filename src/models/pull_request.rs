//! Pull request model.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maximum number of reviewers assigned to one pull request.
pub const MAX_REVIEWERS: usize = 2;

/// Lifecycle status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    /// Value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }

    /// Whether a pull request in this status with `reviewer_count` reviewers is understaffed.
    pub fn needs_more_reviewers(&self, reviewer_count: usize) -> bool {
        *self == Self::Open && reviewer_count < MAX_REVIEWERS
    }
}

impl From<&str> for PullRequestStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MERGED" => Self::Merged,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
}

impl NewPullRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author_id: author_id.into(),
        }
    }

    /// Reject empty identifiers before touching the store.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::invalid_input_field("pull request id must not be empty", "pull_request_id"));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::invalid_input_field("pull request name must not be empty", "pull_request_name"));
        }
        if self.author_id.trim().is_empty() {
            return Err(AppError::invalid_input_field("author id must not be empty", "author_id"));
        }
        Ok(())
    }
}

/// A pull request with its current reviewer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    /// True while the pull request is open and below [`MAX_REVIEWERS`].
    pub need_more_reviewers: bool,
    /// Reviewer user ids. Order carries no meaning.
    pub assigned_reviewers: Vec<String>,
    /// Creation timestamp (Unix).
    pub created_at: i64,
    /// Merge timestamp (Unix, if merged).
    pub merged_at: Option<i64>,
}

impl PullRequest {
    /// Check if the pull request is open.
    pub fn is_open(&self) -> bool {
        self.status == PullRequestStatus::Open
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|r| r == user_id)
    }
}

/// Row shape of the `pull_requests` table.
#[derive(Debug, Clone, FromRow)]
pub struct PullRequestRow {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: String,
    pub need_more_reviewers: bool,
    pub created_at: i64,
    pub merged_at: Option<i64>,
}

impl PullRequestRow {
    /// Parse the status string into an enum.
    pub fn status_enum(&self) -> PullRequestStatus {
        PullRequestStatus::from(self.status.as_str())
    }

    pub fn into_pull_request(self, assigned_reviewers: Vec<String>) -> PullRequest {
        let status = self.status_enum();
        PullRequest {
            id: self.id,
            name: self.name,
            author_id: self.author_id,
            status,
            need_more_reviewers: self.need_more_reviewers,
            assigned_reviewers,
            created_at: self.created_at,
            merged_at: self.merged_at,
        }
    }
}

/// Pull request summary, as listed for a reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PullRequestShort {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: String,
}

/// Result of a successful reviewer swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReassignOutcome {
    pub pull_request: PullRequest,
    pub new_reviewer_id: String,
}

/// What happened to one pull request when a reviewer was pulled from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewerBackfill {
    pub pull_request_id: String,
    /// The reviewer that took the freed slot, if any was eligible.
    pub replacement_id: Option<String>,
}
