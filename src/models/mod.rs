//! Data models for the application.
//!
//! These models represent the entities stored in the SQLite database and
//! returned by the services. Row structs derive `FromRow`; the public models
//! derive `Serialize` for the HTTP layer.

pub mod pull_request;
pub mod team;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{
    NewPullRequest, PullRequest, PullRequestRow, PullRequestShort, PullRequestStatus,
    ReassignOutcome, ReviewerBackfill, MAX_REVIEWERS,
};
pub use team::{Team, TeamMember, TeamWithMembers};
pub use user::{User, UserAssignmentStat};
