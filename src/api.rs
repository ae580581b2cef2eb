//! HTTP routes.
//!
//! Thin JSON mapping over the services. Every failure renders as
//! `{"error": {"code": ..., "message": ...}}` with a status derived from the
//! error code.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::logging::SharedLogger;
use crate::models::{
    NewPullRequest, PullRequest, PullRequestShort, TeamMember, TeamWithMembers, User,
    UserAssignmentStat,
};
use crate::services::{
    AssignmentService, RebalancePublisher, StatisticsService, TeamService, UserService,
};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

/// Services shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub assignment: AssignmentService,
    pub users: UserService,
    pub teams: TeamService,
    pub statistics: StatisticsService,
}

impl AppState {
    pub fn new(pool: DbPool, publisher: RebalancePublisher, logger: SharedLogger) -> Self {
        let assignment = AssignmentService::new(pool.clone(), logger.clone());
        Self {
            users: UserService::new(pool.clone(), assignment.clone(), publisher, logger.clone()),
            teams: TeamService::new(pool.clone(), logger),
            statistics: StatisticsService::new(pool),
            assignment,
        }
    }
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

impl ApiErr {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::PullRequestExists { .. }
            | AppError::PrMerged { .. }
            | AppError::NotAssigned { .. }
            | AppError::NoCandidate { .. }
            | AppError::UserAlreadyExists { .. } => StatusCode::CONFLICT,
            AppError::TeamAlreadyExists { .. } | AppError::InvalidInput { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs.
        let message = if self.0.is_domain() {
            self.0.to_string()
        } else {
            "internal server error".to_string()
        };
        (
            status,
            Json(ErrorBody {
                error: ErrorDetail {
                    code: self.0.code(),
                    message,
                },
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

// ── Request bodies ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TeamAddRequest {
    team_name: String,
    #[serde(default)]
    members: Vec<TeamMember>,
}

#[derive(Deserialize)]
struct TeamQuery {
    team_name: String,
}

#[derive(Deserialize)]
struct SetIsActiveRequest {
    user_id: String,
    is_active: bool,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

#[derive(Deserialize)]
struct CreatePullRequestRequest {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
}

#[derive(Deserialize)]
struct MergePullRequestRequest {
    pull_request_id: String,
}

#[derive(Deserialize)]
struct ReassignRequest {
    pull_request_id: String,
    old_user_id: String,
}

// ── Response bodies ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TeamResponse {
    team_name: String,
    members: Vec<TeamMember>,
}

impl From<TeamWithMembers> for TeamResponse {
    fn from(team: TeamWithMembers) -> Self {
        Self {
            members: team.members.iter().map(TeamMember::from).collect(),
            team_name: team.team.name,
        }
    }
}

#[derive(Serialize)]
struct UserResponse {
    user_id: String,
    username: String,
    team_name: String,
    is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.name,
            team_name: user.team_id,
            is_active: user.is_active,
        }
    }
}

#[derive(Serialize)]
struct PullRequestResponse {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
    assigned_reviewers: Vec<String>,
    need_more_reviewers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    merged_at: Option<String>,
}

impl From<PullRequest> for PullRequestResponse {
    fn from(pr: PullRequest) -> Self {
        Self {
            status: pr.status.to_string(),
            created_at: rfc3339(pr.created_at),
            merged_at: pr.merged_at.and_then(rfc3339),
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            assigned_reviewers: pr.assigned_reviewers,
            need_more_reviewers: pr.need_more_reviewers,
        }
    }
}

#[derive(Serialize)]
struct PullRequestShortResponse {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
}

impl From<PullRequestShort> for PullRequestShortResponse {
    fn from(pr: PullRequestShort) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status: pr.status,
        }
    }
}

fn rfc3339(timestamp: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(timestamp, 0).map(|dt| dt.to_rfc3339())
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/team/add", post(add_team))
        .route("/team/get", get(get_team))
        .route("/users/setIsActive", post(set_is_active))
        .route("/users/getReview", get(get_user_reviews))
        .route("/pullRequest/create", post(create_pull_request))
        .route("/pullRequest/merge", post(merge_pull_request))
        .route("/pullRequest/reassign", post(reassign_reviewer))
        .route("/stats/assignments", get(assignment_stats))
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /team/add: create a team with its members.
async fn add_team(
    State(state): State<AppState>,
    body: Result<Json<TeamAddRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiErr> {
    let Json(req) = body?;
    let team = state.teams.create_team(&req.team_name, &req.members).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "team": TeamResponse::from(team) })),
    ))
}

/// GET /team/get?team_name=X
async fn get_team(
    State(state): State<AppState>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<TeamResponse>, ApiErr> {
    let Query(params) = query?;
    let team = state.teams.get_team(&params.team_name).await?;
    Ok(Json(team.into()))
}

/// POST /users/setIsActive: toggle a user, rebalancing follows asynchronously.
async fn set_is_active(
    State(state): State<AppState>,
    body: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let Json(req) = body?;
    let user = state.users.set_is_active(&req.user_id, req.is_active).await?;
    Ok(Json(serde_json::json!({ "user": UserResponse::from(user) })))
}

/// GET /users/getReview?user_id=X
async fn get_user_reviews(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let Query(params) = query?;
    let reviews = state.users.get_user_reviews(&params.user_id).await?;

    let pull_requests: Vec<PullRequestShortResponse> = reviews
        .pull_requests
        .into_iter()
        .map(PullRequestShortResponse::from)
        .collect();

    Ok(Json(serde_json::json!({
        "user_id": reviews.user_id,
        "pull_requests": pull_requests,
    })))
}

/// POST /pullRequest/create
async fn create_pull_request(
    State(state): State<AppState>,
    body: Result<Json<CreatePullRequestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiErr> {
    let Json(req) = body?;
    let new_pr = NewPullRequest::new(req.pull_request_id, req.pull_request_name, req.author_id);
    let pr = state.assignment.create_pull_request(new_pr).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "pr": PullRequestResponse::from(pr) })),
    ))
}

/// POST /pullRequest/merge
async fn merge_pull_request(
    State(state): State<AppState>,
    body: Result<Json<MergePullRequestRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let Json(req) = body?;
    let pr = state.assignment.merge(&req.pull_request_id).await?;
    Ok(Json(serde_json::json!({ "pr": PullRequestResponse::from(pr) })))
}

/// POST /pullRequest/reassign
async fn reassign_reviewer(
    State(state): State<AppState>,
    body: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let Json(req) = body?;
    let outcome = state
        .assignment
        .reassign(&req.pull_request_id, &req.old_user_id)
        .await?;

    Ok(Json(serde_json::json!({
        "pr": PullRequestResponse::from(outcome.pull_request),
        "replaced_by": outcome.new_reviewer_id,
    })))
}

/// GET /stats/assignments
async fn assignment_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let stats: Vec<UserAssignmentStat> = state.statistics.user_assignment_stats().await?;
    Ok(Json(serde_json::json!({ "stats": stats })))
}
