//! Application error types.
//!
//! Every fallible operation in the crate reports an [`AppError`]. Domain
//! variants carry the stable error codes exposed over HTTP; unclassified
//! storage failures become [`AppError::Internal`] with the original cause
//! kept as the error source.

use serde::Serialize;
use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Application-level errors returned by services and persistence.
///
/// All variants serialize to a structured JSON object; the internal cause is
/// never serialized but stays reachable through [`std::error::Error::source`].
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Referenced pull request, user or team does not exist.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// A pull request with this id already exists.
    #[error("Pull request already exists: {id}")]
    PullRequestExists { id: String },

    /// A user with this id already exists.
    ///
    /// Not raised today: team creation upserts its members. Kept so the
    /// `USER_EXISTS` wire code has a variant.
    #[error("User already exists: {id}")]
    UserAlreadyExists { id: String },

    /// A team with this name already exists.
    #[error("Team already exists: {name}")]
    TeamAlreadyExists { name: String },

    /// Mutation attempted on a merged pull request.
    #[error("Pull request is merged: {id}")]
    PrMerged { id: String },

    /// Reassign target is not a reviewer of the pull request.
    #[error("Reviewer {reviewer_id} is not assigned to pull request {pull_request_id}")]
    NotAssigned {
        pull_request_id: String,
        reviewer_id: String,
    },

    /// No eligible replacement or assignee exists.
    #[error("No candidate: {message}")]
    NoCandidate { message: String },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Unclassified failure, usually from the store.
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[serde(skip)]
        #[source]
        source: Option<BoxedCause>,
    },
}

impl AppError {
    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    pub fn pull_request_exists(id: impl Into<String>) -> Self {
        Self::PullRequestExists { id: id.into() }
    }

    pub fn team_exists(name: impl Into<String>) -> Self {
        Self::TeamAlreadyExists { name: name.into() }
    }

    pub fn pr_merged(id: impl Into<String>) -> Self {
        Self::PrMerged { id: id.into() }
    }

    pub fn not_assigned(pull_request_id: impl Into<String>, reviewer_id: impl Into<String>) -> Self {
        Self::NotAssigned {
            pull_request_id: pull_request_id.into(),
            reviewer_id: reviewer_id.into(),
        }
    }

    pub fn no_candidate(message: impl Into<String>) -> Self {
        Self::NoCandidate {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error without a cause.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an unclassified failure, keeping it as the error source.
    pub fn internal_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PullRequestExists { .. } => "PR_EXISTS",
            Self::UserAlreadyExists { .. } => "USER_EXISTS",
            Self::TeamAlreadyExists { .. } => "TEAM_EXISTS",
            Self::PrMerged { .. } => "PR_MERGED",
            Self::NotAssigned { .. } => "NOT_ASSIGNED",
            Self::NoCandidate { .. } => "NO_CANDIDATE",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Whether this is a classified domain error rather than an internal failure.
    pub fn is_domain(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    /// Pass domain errors through, re-wrap internal ones with extra context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Internal { message, source } => Self::Internal {
                message: format!("{}: {}", context.into(), message),
                source,
            },
            other => other,
        }
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal_with_source("database error", err)
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::internal_with_source("database setup failed", err)
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::internal_with_source("invalid configuration", err)
    }
}
