//! Deployment worker: claims queued deployments and drives them to a terminal status

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::deploy::fsm::DeploymentEvent;
use crate::deploy::log_sink::{self, DeploymentLog};
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::process::Cancellation;
use crate::errors::DaemonError;
use crate::integrations::{Collaborators, Notice, TrackerState};
use crate::models::deployment::Deployment;
use crate::workers::queue::DeploymentQueue;
use crate::workers::registry::ActiveRegistry;

/// Lines of the deployment log attached to a failure notification
pub const FAILURE_SNIPPET_LINES: usize = 20;

/// Everything a worker shares with the rest of the pool
pub struct WorkerContext {
    pub queue: Arc<DeploymentQueue>,
    pub registry: Arc<ActiveRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub collaborators: Collaborators,
    pub cancel: Cancellation,
}

/// Run one worker until the queue is closed and drained
pub async fn run(worker_id: usize, ctx: Arc<WorkerContext>) {
    info!("Deployer worker {} starting...", worker_id);

    while let Some(deployment) = ctx.queue.next().await {
        info!("Worker {} picked up deployment {}", worker_id, deployment.id);
        let deployment = process_deployment(&ctx, deployment).await;
        info!(
            "Worker {} finished deployment {}: {}",
            worker_id,
            deployment.id,
            deployment.status()
        );
    }

    info!("Deployer worker {} shutting down...", worker_id);
}

/// Claim, execute and finish one deployment.
///
/// Returns the deployment in a terminal status unless it could not be claimed.
pub async fn process_deployment(ctx: &WorkerContext, mut deployment: Deployment) -> Deployment {
    if let Err(e) = deployment.apply(DeploymentEvent::Claim) {
        error!("Cannot claim deployment {}: {}", deployment.id, e);
        return deployment;
    }
    ctx.registry.claim(&deployment);
    persist(ctx, &deployment).await;
    track(ctx, &deployment, TrackerState::InProgress, None, "Deployment started").await;

    let result = execute(ctx, &mut deployment).await;

    match result {
        Ok(()) => finish_success(ctx, &mut deployment).await,
        Err(e) => finish_failure(ctx, &mut deployment, e).await,
    }
    deployment
}

async fn execute(ctx: &WorkerContext, deployment: &mut Deployment) -> Result<(), DaemonError> {
    if ctx.cancel.is_cancelled() {
        return Err(DaemonError::Cancelled("daemon is shutting down".to_string()));
    }

    let path = deployment
        .log_path
        .clone()
        .ok_or_else(|| DaemonError::Internal(format!("deployment {} has no log path", deployment.id)))?;
    let log = DeploymentLog::open(path)?;

    ctx.orchestrator.execute(deployment, &log).await
}

async fn finish_success(ctx: &WorkerContext, deployment: &mut Deployment) {
    if let Err(e) = deployment.apply(DeploymentEvent::Succeed) {
        error!("Cannot complete deployment {}: {}", deployment.id, e);
    }
    ctx.registry.release(&deployment.id);
    persist(ctx, deployment).await;

    let url = deployment.url.clone().unwrap_or_default();
    info!(
        "Deployment {} succeeded in {:.1}s: {}",
        deployment.id,
        deployment.duration_secs(),
        url
    );
    append_to_log(deployment, &format!("==> Deployment succeeded: {}", url));

    track(ctx, deployment, TrackerState::Success, Some(&url), "Deployment successful").await;
    if let (Some(tracker), Some(pr_number)) = (&ctx.collaborators.tracker, deployment.pr_number) {
        if deployment.external_id.is_some() {
            let body = format!("Preview deployment ready at {}", url);
            if let Err(e) = tracker
                .add_pr_comment(&deployment.owner, &deployment.repo, pr_number, &body)
                .await
            {
                warn!("Failed to comment on PR #{}: {}", pr_number, e);
            }
        }
    }

    if let Some(notifier) = ctx.collaborators.notifier.clone() {
        let notice = Notice::for_deployment(deployment);
        tokio::spawn(async move {
            if let Err(e) = notifier.send_deployment_success(&notice, &url).await {
                warn!("Failed to send success notification: {}", e);
            }
        });
    }
}

async fn finish_failure(ctx: &WorkerContext, deployment: &mut Deployment, err: DaemonError) {
    let message = err.to_string();
    if let Err(e) = deployment.apply(DeploymentEvent::Fail(message.clone())) {
        error!("Cannot fail deployment {}: {}", deployment.id, e);
    }
    ctx.registry.release(&deployment.id);
    persist(ctx, deployment).await;

    error!("Deployment {} failed: {}", deployment.id, message);
    append_to_log(deployment, &format!("==> Deployment failed: {}", message));

    track(ctx, deployment, TrackerState::Failure, None, &message).await;

    if let Some(notifier) = ctx.collaborators.notifier.clone() {
        let notice = Notice::for_deployment(deployment);
        let snippet = deployment
            .log_path
            .as_deref()
            .map(|path| log_sink::tail(path, FAILURE_SNIPPET_LINES))
            .unwrap_or_default();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .send_deployment_failure(&notice, &message, &snippet)
                .await
            {
                warn!("Failed to send failure notification: {}", e);
            }
        });
    }
}

/// Storage failures after enqueue never change the outcome
async fn persist(ctx: &WorkerContext, deployment: &Deployment) {
    if let Err(e) = ctx.collaborators.store.update(deployment).await {
        warn!("Failed to persist deployment {}: {}", deployment.id, e);
    }
}

async fn track(
    ctx: &WorkerContext,
    deployment: &Deployment,
    state: TrackerState,
    url: Option<&str>,
    description: &str,
) {
    let (Some(tracker), Some(external_id)) = (&ctx.collaborators.tracker, deployment.external_id)
    else {
        return;
    };

    if let Err(e) = tracker
        .update_deployment_status(
            &deployment.owner,
            &deployment.repo,
            external_id,
            state,
            url,
            description,
        )
        .await
    {
        warn!(
            "Failed to update status of deployment {} to {}: {}",
            deployment.id,
            state.as_str(),
            e
        );
    }
}

fn append_to_log(deployment: &Deployment, line: &str) {
    if let Some(path) = &deployment.log_path {
        if let Ok(log) = DeploymentLog::open(path) {
            log.line(line);
        }
    }
}
