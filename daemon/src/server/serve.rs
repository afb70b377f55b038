//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DaemonError;
use crate::server::handlers::{
    active_deployments_handler, deploy_handler, deployment_handler, deployment_log_handler,
    deployments_handler, health_handler, redeploy_handler, version_handler,
};
use crate::server::webhook::github_webhook_handler;
use crate::server::state::ServerState;

/// Admin API routes
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deployments
        .route("/deployments", post(deploy_handler).get(deployments_handler))
        .route("/deployments/active", get(active_deployments_handler))
        .route("/deployments/{id}", get(deployment_handler))
        .route("/deployments/{id}/log", get(deployment_log_handler))
        .route("/deployments/{id}/redeploy", post(redeploy_handler))
        // GitHub
        .route("/webhook/github", post(github_webhook_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DaemonError>>, DaemonError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting admin server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DaemonError::ServerError(format!("failed to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DaemonError::ServerError(e.to_string()))
    });

    Ok(handle)
}
