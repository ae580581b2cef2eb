//! HTTP routes exercised in-process with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use review_assigner_lib::api::{self, AppState};
use review_assigner_lib::db;
use review_assigner_lib::logging::MemoryLogger;
use review_assigner_lib::services::{rebalance_queue, RebalanceEvent};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tokio::sync::mpsc;
use tower::ServiceExt;

struct TestApp {
    _dir: TempDir,
    router: Router,
    events: mpsc::Receiver<RebalanceEvent>,
}

async fn app() -> TestApp {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("api.db")).await.unwrap();
    let logger = MemoryLogger::new();
    let (publisher, events) = rebalance_queue::channel(8, logger.clone());
    let router = api::router(AppState::new(pool, publisher, logger));

    TestApp {
        _dir: dir,
        router,
        events,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn add_team(router: &Router) {
    let (status, _) = send(
        router,
        post(
            "/team/add",
            json!({
                "team_name": "backend",
                "members": [
                    { "user_id": "u1", "username": "Alice", "is_active": true },
                    { "user_id": "u2", "username": "Bob", "is_active": true },
                    { "user_id": "u3", "username": "Carol", "is_active": true }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_team_add_and_get() {
    let app = app().await;
    add_team(&app.router).await;

    let (status, body) = send(&app.router, get("/team/get?team_name=backend")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team_name"], "backend");
    assert_eq!(body["members"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &app.router,
        post("/team/add", json!({ "team_name": "backend", "members": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "TEAM_EXISTS");

    let (status, body) = send(&app.router, get("/team/get?team_name=frontend")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_pull_request_lifecycle() {
    let app = app().await;
    add_team(&app.router).await;

    let (status, body) = send(
        &app.router,
        post(
            "/pullRequest/create",
            json!({ "pull_request_id": "pr-1", "pull_request_name": "Add search", "author_id": "u1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["pr"]["status"], "OPEN");
    assert_eq!(body["pr"]["need_more_reviewers"], false);
    let reviewers: Vec<String> = serde_json::from_value(body["pr"]["assigned_reviewers"].clone()).unwrap();
    assert_eq!(reviewers.len(), 2);
    assert!(!reviewers.contains(&"u1".to_string()));

    let (status, body) = send(
        &app.router,
        post(
            "/pullRequest/create",
            json!({ "pull_request_id": "pr-1", "pull_request_name": "Again", "author_id": "u1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "PR_EXISTS");

    // Only the author is left to pick, so no replacement exists.
    let (status, body) = send(
        &app.router,
        post(
            "/pullRequest/reassign",
            json!({ "pull_request_id": "pr-1", "old_user_id": reviewers[0] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "NO_CANDIDATE");

    let (status, body) = send(
        &app.router,
        post("/pullRequest/reassign", json!({ "pull_request_id": "pr-1", "old_user_id": "u1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "NOT_ASSIGNED");

    let (status, body) = send(
        &app.router,
        get(&format!("/users/getReview?user_id={}", reviewers[0])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pull_requests"][0]["pull_request_id"], "pr-1");

    let (status, body) = send(
        &app.router,
        post("/pullRequest/merge", json!({ "pull_request_id": "pr-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pr"]["status"], "MERGED");
    assert!(body["pr"]["merged_at"].is_string());

    let (status, body) = send(
        &app.router,
        post("/pullRequest/merge", json!({ "pull_request_id": "pr-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "PR_MERGED");

    let (status, body) = send(&app.router, get("/stats/assignments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_set_is_active_enqueues_rebalance() {
    let mut app = app().await;
    add_team(&app.router).await;

    let (status, body) = send(
        &app.router,
        post("/users/setIsActive", json!({ "user_id": "u2", "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["is_active"], false);
    assert_eq!(body["user"]["team_name"], "backend");

    assert_eq!(app.events.try_recv().unwrap(), RebalanceEvent::new("u2", false));

    let (status, body) = send(
        &app.router,
        post("/users/setIsActive", json!({ "user_id": "ghost", "is_active": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(app.events.try_recv().is_err());
}

#[tokio::test]
async fn test_bad_requests() {
    let app = app().await;

    let (status, body) = send(
        &app.router,
        post("/pullRequest/create", json!({ "pull_request_id": "pr-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = send(&app.router, get("/users/getReview")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = send(
        &app.router,
        post(
            "/pullRequest/create",
            json!({ "pull_request_id": "pr-1", "pull_request_name": "X", "author_id": "nobody" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
