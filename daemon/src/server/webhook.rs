//! GitHub webhook intake
//!
//! Deliveries are authenticated with the `X-Hub-Signature-256` HMAC before
//! the body is even parsed. Push and pull-request events become queued
//! deployments; everything else is acknowledged and dropped.

use std::sync::Arc;

use admin_api::models::WebhookResponse;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::errors::DaemonError;
use crate::models::deployment::Deployment;
use crate::server::handlers::{deploy_response, ApiError};
use crate::server::state::ServerState;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";

type HmacSha256 = Hmac<Sha256>;

/// Check a `sha256=<hex>` signature of `body`; an empty secret never verifies
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(digest) = signature
        .strip_prefix("sha256=")
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
    else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    // constant time
    mac.verify_slice(&digest).is_ok()
}

/// `sha256=<hex>` signature of `body`, as GitHub sends it
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, DaemonError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| DaemonError::Internal(format!("invalid webhook secret: {}", e)))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    clone_url: String,
    owner: Account,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    after: String,
    repository: Repository,

    /// Branch deletions arrive as pushes of the all-zero sha
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct PullRequestHead {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    head: PullRequestHead,
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    action: String,
    pull_request: PullRequest,
    repository: Repository,
}

fn acknowledged(message: impl Into<String>) -> (StatusCode, Json<WebhookResponse>) {
    (
        StatusCode::OK,
        Json(WebhookResponse {
            message: message.into(),
            deployment: None,
        }),
    )
}

fn parse<T: DeserializeOwned>(body: &[u8], event: &str) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Unparseable {} payload: {}", event, e);
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("failed to parse {} event", event),
        )
    })
}

/// Map a delivery onto the deployment it asks for, if any
fn deployment_for_event(event: &str, body: &[u8]) -> Result<Option<Deployment>, ApiError> {
    match event {
        "push" => {
            let push: PushEvent = parse(body, event)?;
            if push.deleted {
                return Ok(None);
            }
            let repository = push.repository;
            Ok(Some(
                Deployment::new(repository.owner.login, repository.name, push.git_ref, push.after)
                    .with_clone_url(repository.clone_url),
            ))
        }
        "pull_request" => {
            let pr: PullRequestEvent = parse(body, event)?;
            if pr.action != "opened" && pr.action != "synchronize" {
                return Ok(None);
            }
            let repository = pr.repository;
            let head = pr.pull_request.head;
            Ok(Some(
                Deployment::new(repository.owner.login, repository.name, head.git_ref, head.sha)
                    .with_clone_url(repository.clone_url)
                    .with_pull_request(pr.pull_request.number),
            ))
        }
        _ => Ok(None),
    }
}

/// `POST /webhook/github`
pub async fn github_webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let secret = state
        .app
        .webhook_secret
        .as_ref()
        .map(|s| s.expose_secret().as_bytes())
        .unwrap_or_default();
    if !verify_signature(secret, &body, signature) {
        warn!("Rejected webhook delivery with invalid signature");
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid signature"));
    }

    let Some(event) = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "missing X-GitHub-Event header",
        ));
    };

    if event == "ping" {
        return Ok(acknowledged("pong"));
    }

    let Some(mut deployment) = deployment_for_event(event, &body)? else {
        debug!("Ignoring {} delivery", event);
        return Ok(acknowledged(format!("event {} not handled", event)));
    };

    if let Some(tracker) = &state.app.tracker {
        let registered = tracker
            .create_deployment(
                &deployment.owner,
                &deployment.repo,
                &deployment.sha,
                &deployment.environment,
            )
            .await;
        match registered {
            Ok(external_id) => deployment = deployment.with_external_id(external_id),
            Err(e) => warn!(
                "Failed to register {} with the status tracker: {}",
                deployment.project(),
                e
            ),
        }
    }

    state.app.enqueue(&mut deployment).await?;
    info!(
        "Webhook {} queued deployment {} ({})",
        event, deployment.id, deployment.environment
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookResponse {
            message: "deployment queued".to_string(),
            deployment: Some(deploy_response(deployment)),
        }),
    ))
}
