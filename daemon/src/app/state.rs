//! Application state management

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::app::options::{copy_secret, AppOptions};
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::process::{cancellation, CancelHandle, Cancellation, CommandRunner, SystemRunner};
use crate::detect::DetectorManager;
use crate::errors::DaemonError;
use crate::integrations::{Collaborators, StatusTracker};
use crate::models::deployment::Deployment;
use crate::storage::deployments::DeploymentStore;
use crate::workers::{ActiveRegistry, DeploymentQueue, WorkerContext, WorkerPool};

/// State shared by the admin server and the run loop
pub struct AppState {
    pub version: String,
    pub queue: Arc<DeploymentQueue>,
    pub registry: Arc<ActiveRegistry>,
    pub store: Arc<dyn DeploymentStore>,

    /// Registers webhook-triggered deployments externally
    pub tracker: Option<Arc<dyn StatusTracker>>,
    pub webhook_secret: Option<SecretString>,
    pub logs_dir: PathBuf,
}

impl AppState {
    /// Build the engine and start its worker pool
    pub async fn init(
        version: String,
        options: &AppOptions,
        store: Arc<dyn DeploymentStore>,
    ) -> Result<(Self, WorkerPool), DaemonError> {
        info!("Initializing application state...");

        let (cancel_handle, cancel) = cancellation();
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new(cancel.clone()));
        let collaborators = options.collaborators(store)?;
        Self::init_with_runner(version, options, collaborators, runner, cancel_handle, cancel)
            .await
    }

    /// As [`AppState::init`] with caller-supplied collaborators and command runner
    pub async fn init_with_runner(
        version: String,
        options: &AppOptions,
        collaborators: Collaborators,
        runner: Arc<dyn CommandRunner>,
        cancel_handle: CancelHandle,
        cancel: Cancellation,
    ) -> Result<(Self, WorkerPool), DaemonError> {
        tokio::fs::create_dir_all(&options.repos_dir).await?;
        tokio::fs::create_dir_all(&options.logs_dir).await?;

        let orchestrator = Arc::new(Orchestrator::new(
            options.orchestrator(),
            DetectorManager::with_defaults(),
            runner,
        ));

        let store = collaborators.store.clone();
        let tracker = collaborators.tracker.clone();

        let queue = Arc::new(DeploymentQueue::new(
            options.queue_capacity,
            store.clone(),
            &options.logs_dir,
        ));
        let registry = Arc::new(ActiveRegistry::new());

        let ctx = Arc::new(WorkerContext {
            queue: queue.clone(),
            registry: registry.clone(),
            orchestrator,
            collaborators,
            cancel,
        });
        let pool = WorkerPool::start(options.deployer.clone(), ctx, cancel_handle);

        let state = Self {
            version,
            queue,
            registry,
            store,
            tracker,
            webhook_secret: options.webhook_secret.as_ref().map(copy_secret),
            logs_dir: options.logs_dir.clone(),
        };
        Ok((state, pool))
    }

    /// Queue a deployment; see [`DeploymentQueue::enqueue`]
    pub async fn enqueue(&self, deployment: &mut Deployment) -> Result<(), DaemonError> {
        self.queue.enqueue(deployment).await
    }
}
