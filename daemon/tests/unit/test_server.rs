//! Admin API tests

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use admin_api::models::{
    DeployResponse, DeploymentListResponse, DeploymentSummary, ErrorResponse, WebhookResponse,
};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{existing_checkout, RecordingTracker, ScriptedRunner, CREATED_DEPLOYMENT_ID};
use dockyard::app::options::AppOptions;
use dockyard::app::state::AppState;
use dockyard::deploy::process::cancellation;
use dockyard::integrations::Collaborators;
use dockyard::server::serve::router;
use dockyard::server::state::ServerState;
use dockyard::server::webhook::{sign, EVENT_HEADER, SIGNATURE_HEADER};
use dockyard::storage::deployments::MemoryDeploymentStore;
use dockyard::workers::{pool, WorkerPool};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use tower::ServiceExt;

const WEBHOOK_SECRET: &str = "hook-secret";

struct TestServer {
    app: Router,
    pool: WorkerPool,
    tracker: Arc<RecordingTracker>,
    _dir: TempDir,
}

async fn server() -> TestServer {
    let dir = TempDir::new().unwrap();
    let repos_dir = dir.path().join("repos");
    let checkout = existing_checkout(&repos_dir, "acme", "site", "production");
    fs::write(checkout.join("index.html"), "").unwrap();

    let options = AppOptions {
        repos_dir,
        logs_dir: dir.path().join("logs"),
        data_dir: dir.path().join("data"),
        deployment_domain: "example.test".to_string(),
        webhook_secret: Some(SecretString::from(WEBHOOK_SECRET.to_string())),
        deployer: pool::Options {
            workers: 1,
            ..Default::default()
        },
        ..AppOptions::default()
    };

    let tracker = Arc::new(RecordingTracker::default());
    let collaborators =
        Collaborators::with_store(Arc::new(MemoryDeploymentStore::new())).tracker(tracker.clone());

    let (cancel_handle, cancel) = cancellation();
    let (state, pool) = AppState::init_with_runner(
        "test".to_string(),
        &options,
        collaborators,
        Arc::new(ScriptedRunner::new()),
        cancel_handle,
        cancel,
    )
    .await
    .unwrap();

    TestServer {
        app: router(Arc::new(ServerState::new(Arc::new(state)))),
        pool,
        tracker,
        _dir: dir,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn json<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_deploy(body: &str) -> Request<Body> {
    Request::post("/deployments")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook(event: &str, body: &serde_json::Value, secret: &str) -> Request<Body> {
    let body = body.to_string();
    Request::post("/webhook/github")
        .header("content-type", "application/json")
        .header(EVENT_HEADER, event)
        .header(SIGNATURE_HEADER, sign(secret.as_bytes(), body.as_bytes()).unwrap())
        .body(Body::from(body))
        .unwrap()
}

fn repository() -> serde_json::Value {
    serde_json::json!({
        "name": "site",
        "clone_url": "https://github.com/acme/site.git",
        "owner": {"login": "acme"},
    })
}

#[tokio::test]
async fn test_health() {
    let server = server().await;

    let (status, body) = send(&server.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = json(&body);
    assert_eq!(health["status"], "healthy");

    server.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deploy_and_inspect() {
    let server = server().await;

    let (status, body) = send(
        &server.app,
        post_deploy(r#"{"owner": "acme", "repo": "site", "sha": "abcdef1234567890"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let accepted: DeployResponse = json(&body);
    assert!(accepted.id.starts_with("acme-site-abcdef1-"));
    assert_eq!(accepted.status, "queued");
    assert_eq!(accepted.environment, "production");

    // drain the queue so the record is final
    server.pool.shutdown().await.unwrap();

    let (status, body) = send(&server.app, get(&format!("/deployments/{}", accepted.id))).await;
    assert_eq!(status, StatusCode::OK);
    let summary: DeploymentSummary = json(&body);
    assert_eq!(summary.status, "success");
    assert_eq!(summary.url.as_deref(), Some("https://site.example.test"));

    let (status, body) = send(&server.app, get("/deployments?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    let list: DeploymentListResponse = json(&body);
    assert_eq!(list.total, 1);

    let (status, body) = send(&server.app, get(&format!("/deployments/{}/log", accepted.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("==> Published at"));

    let (_, body) = send(&server.app, get("/deployments/active")).await;
    let active: DeploymentListResponse = json(&body);
    assert_eq!(active.total, 0);
}

#[tokio::test]
async fn test_invalid_request_is_bad_request() {
    let server = server().await;

    let (status, body) = send(
        &server.app,
        post_deploy(r#"{"owner": "acme", "repo": "site", "sha": "nope"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json(&body);
    assert!(error.error.starts_with("Validation rejected"));

    server.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_closed_queue_is_unavailable() {
    let server = server().await;
    server.pool.shutdown().await.unwrap();

    let (status, _) = send(
        &server.app,
        post_deploy(r#"{"owner": "acme", "repo": "site", "sha": "abcdef1234567890"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_deployment_is_not_found() {
    let server = server().await;

    let (status, _) = send(&server.app, get("/deployments/acme-site-abcdef1-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&server.app, get("/deployments/acme-site-abcdef1-1/log")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_signed_push_is_queued_and_tracked() {
    let server = server().await;
    let push = serde_json::json!({
        "ref": "refs/heads/main",
        "after": "abcdef1234567890",
        "repository": repository(),
    });

    let (status, body) = send(&server.app, webhook("push", &push, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let reply: WebhookResponse = json(&body);
    let queued = reply.deployment.unwrap();
    assert_eq!(queued.environment, "production");

    server.pool.shutdown().await.unwrap();

    let (_, body) = send(&server.app, get(&format!("/deployments/{}", queued.id))).await;
    let summary: DeploymentSummary = json(&body);
    assert_eq!(summary.status, "success");

    let events = server.tracker.events.lock().unwrap().clone();
    assert_eq!(events[0], "create production abcdef1234567890");
    assert!(events.contains(&format!(
        "status {} success https://site.example.test",
        CREATED_DEPLOYMENT_ID
    )));
}

#[tokio::test]
async fn test_unsigned_or_forged_delivery_is_unauthorized() {
    let server = server().await;
    let push = serde_json::json!({
        "ref": "refs/heads/main",
        "after": "abcdef1234567890",
        "repository": repository(),
    });

    let (status, _) = send(&server.app, webhook("push", &push, "wrong-secret")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unsigned = Request::post("/webhook/github")
        .header(EVENT_HEADER, "push")
        .body(Body::from(push.to_string()))
        .unwrap();
    let (status, _) = send(&server.app, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = send(&server.app, get("/deployments")).await;
    let list: DeploymentListResponse = json(&body);
    assert_eq!(list.total, 0);
    assert!(server.tracker.events.lock().unwrap().is_empty());

    server.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_uninteresting_deliveries_are_acknowledged() {
    let server = server().await;

    let (status, body) = send(&server.app, webhook("ping", &serde_json::json!({}), WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<WebhookResponse>(&body).message, "pong");

    let closed = serde_json::json!({
        "action": "closed",
        "number": 7,
        "pull_request": {"number": 7, "head": {"ref": "feature", "sha": "abcdef1234567890"}},
        "repository": repository(),
    });
    let (status, body) = send(&server.app, webhook("pull_request", &closed, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<WebhookResponse>(&body).deployment.is_none());

    let (_, body) = send(&server.app, get("/deployments")).await;
    let list: DeploymentListResponse = json(&body);
    assert_eq!(list.total, 0);

    server.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_redeploy_queues_same_commit() {
    let server = server().await;

    let (_, body) = send(
        &server.app,
        post_deploy(r#"{"owner": "acme", "repo": "site", "sha": "abcdef1234567890"}"#),
    )
    .await;
    let first: DeployResponse = json(&body);

    // identifiers have one-second resolution
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let redeploy = Request::post(format!("/deployments/{}/redeploy", first.id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&server.app, redeploy).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let second: DeployResponse = json(&body);
    assert_ne!(second.id, first.id);
    assert_eq!(second.environment, first.environment);

    server.pool.shutdown().await.unwrap();

    let (_, body) = send(&server.app, get(&format!("/deployments/{}", second.id))).await;
    let summary: DeploymentSummary = json(&body);
    assert_eq!(summary.sha, "abcdef1234567890");
    assert_eq!(summary.status, "success");

    let missing = Request::post("/deployments/acme-site-abcdef1-1/redeploy")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&server.app, missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
