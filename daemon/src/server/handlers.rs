//! HTTP request handlers

use std::sync::Arc;

use admin_api::models::{
    DeployRequest, DeployResponse, DeploymentListResponse, DeploymentSummary, ErrorResponse,
    HealthResponse, VersionResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::DaemonError;
use crate::models::deployment::Deployment;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Default page size of the deployment listing
const DEFAULT_LIST_LIMIT: usize = 20;

/// Error body plus status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<DaemonError> for ApiError {
    fn from(err: DaemonError) -> Self {
        let status = match &err {
            DaemonError::ValidationRejected(_) => StatusCode::BAD_REQUEST,
            DaemonError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
            DaemonError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            DaemonError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!("Admin request failed: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn summary(deployment: &Deployment) -> DeploymentSummary {
    DeploymentSummary {
        id: deployment.id.clone(),
        owner: deployment.owner.clone(),
        repo: deployment.repo.clone(),
        git_ref: deployment.git_ref.clone(),
        sha: deployment.sha.clone(),
        environment: deployment.environment.clone(),
        status: deployment.status().to_string(),
        project_type: deployment.project_type.clone(),
        port: deployment.port,
        url: deployment.url.clone(),
        error: deployment.error.clone(),
        started_at: deployment.started_at(),
        completed_at: deployment.completed_at(),
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "dockyard".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

pub(crate) fn deploy_response(deployment: Deployment) -> DeployResponse {
    let status = deployment.status().to_string();
    let log_path = deployment
        .log_path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    DeployResponse {
        id: deployment.id,
        status,
        environment: deployment.environment,
        log_path,
    }
}

/// Turn an admin request into a queued deployment
pub fn deployment_from_request(request: DeployRequest) -> Deployment {
    let git_ref = request
        .git_ref
        .unwrap_or_else(|| "refs/heads/main".to_string());
    let mut deployment = Deployment::new(request.owner, request.repo, git_ref, request.sha);

    if let Some(clone_url) = request.clone_url {
        deployment = deployment.with_clone_url(clone_url);
    }
    if let Some(pr_number) = request.pr_number {
        deployment = deployment.with_pull_request(pr_number);
    }
    if let Some(environment) = request.environment {
        deployment = deployment.with_environment(environment);
    }
    if let Some(external_id) = request.external_id {
        deployment = deployment.with_external_id(external_id);
    }
    deployment
}

/// Queue a deployment
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeployRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut deployment = deployment_from_request(request);
    state.app.enqueue(&mut deployment).await?;

    Ok((StatusCode::ACCEPTED, Json(deploy_response(deployment))))
}

/// A fresh deployment of the same commit to the same environment
pub fn redeployment_of(previous: Deployment) -> Deployment {
    let mut deployment = Deployment::new(previous.owner, previous.repo, previous.git_ref, previous.sha)
        .with_clone_url(previous.clone_url);
    if let Some(pr_number) = previous.pr_number {
        deployment = deployment.with_pull_request(pr_number);
    }
    deployment.with_environment(previous.environment)
}

/// Queue a stored deployment again
pub async fn redeploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let previous = state.app.store.get(&id).await?;
    let mut deployment = redeployment_of(previous);
    state.app.enqueue(&mut deployment).await?;
    info!("Redeploying {} as {}", id, deployment.id);

    Ok((StatusCode::ACCEPTED, Json(deploy_response(deployment))))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Recent deployments, newest first
pub async fn deployments_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let deployments: Vec<DeploymentSummary> =
        state.app.store.list(limit).await?.iter().map(summary).collect();

    Ok(Json(DeploymentListResponse {
        total: deployments.len(),
        deployments,
    }))
}

/// Deployments currently held by a worker
pub async fn active_deployments_handler(
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let deployments: Vec<DeploymentSummary> =
        state.app.registry.snapshot().iter().map(summary).collect();

    Json(DeploymentListResponse {
        total: deployments.len(),
        deployments,
    })
}

pub async fn deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deployment = state.app.store.get(&id).await?;
    Ok(Json(summary(&deployment)))
}

/// The deployment's log artifact as plain text, also while it is still running
pub async fn deployment_log_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deployment = state.app.store.get(&id).await?;
    let path = deployment
        .log_path
        .ok_or_else(|| DaemonError::NotFound(format!("log of deployment {}", id)))?;

    // subprocess output is not necessarily UTF-8
    let contents = match tokio::fs::read(&path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        // queued deployments have no log yet
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(DaemonError::from(e).into()),
    };

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], contents))
}
