//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tabled::{Table, Tabled};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::DaemonError;
use crate::filesys::dir::Dir;
use crate::models::deployment::Deployment;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::storage::deployments::{DeploymentStore, JsonDeploymentStore, MemoryDeploymentStore};
use crate::workers::{pool, WorkerPool};

/// Run the daemon until `shutdown_signal` resolves
pub async fn run(
    version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DaemonError> {
    info!("Initializing dockyard daemon...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone());

    if let Err(e) = init(version, &options, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start daemon: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

/// Run a single deployment to completion on a one-worker pool and return
/// the final record
pub async fn deploy_once(
    version: String,
    options: AppOptions,
    mut deployment: Deployment,
) -> Result<Deployment, DaemonError> {
    let store: Arc<dyn DeploymentStore> = Arc::new(MemoryDeploymentStore::new());
    let options = AppOptions {
        deployer: pool::Options {
            workers: 1,
            ..options.deployer.clone()
        },
        ..options
    };

    let (state, pool) = AppState::init(version, &options, store.clone()).await?;
    state.enqueue(&mut deployment).await?;
    pool.shutdown().await?;

    store.get(&deployment.id).await
}

/// Durable record store under the data directory
pub fn deployment_store(options: &AppOptions) -> JsonDeploymentStore {
    JsonDeploymentStore::new(Dir::new(&options.data_dir).subdir("deployments"))
}

#[derive(Debug, Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "REPO")]
    repo: String,
    #[tabled(rename = "ENV")]
    environment: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "URL")]
    url: String,
}

impl From<&Deployment> for StatusRow {
    fn from(d: &Deployment) -> Self {
        Self {
            id: d.id.clone(),
            repo: d.project(),
            environment: d.environment.clone(),
            status: d.status().to_string(),
            url: d.url.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// The `limit` most recent deployment records as a text table
pub async fn status_report(options: &AppOptions, limit: usize) -> Result<String, DaemonError> {
    let deployments = deployment_store(options).list(limit).await?;
    if deployments.is_empty() {
        return Ok("No deployments found".to_string());
    }
    Ok(Table::new(deployments.iter().map(StatusRow::from)).to_string())
}

// =============================== INITIALIZATION ================================== //

async fn init(
    version: String,
    options: &AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DaemonError> {
    options.layout.setup().await?;
    let store: Arc<dyn DeploymentStore> = Arc::new(deployment_store(options));

    let (state, pool) = AppState::init(version, options, store).await?;
    let state = Arc::new(state);
    shutdown_manager.with_worker_pool(pool)?;

    if options.enable_admin_server {
        init_admin_server(options, state, shutdown_manager, shutdown_tx.subscribe()).await?;
    }

    Ok(())
}

async fn init_admin_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    info!("Initializing local admin server...");

    let server_state = ServerState::new(app_state);

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_admin_server_handle(server_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    worker_pool: Option<WorkerPool>,
    admin_server_handle: Option<JoinHandle<Result<(), DaemonError>>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            shutdown_tx,
            worker_pool: None,
            admin_server_handle: None,
        }
    }

    pub fn with_worker_pool(&mut self, pool: WorkerPool) -> Result<(), DaemonError> {
        if self.worker_pool.is_some() {
            return Err(DaemonError::ShutdownError("worker_pool already set".to_string()));
        }
        self.worker_pool = Some(pool);
        Ok(())
    }

    pub fn with_admin_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DaemonError>>,
    ) -> Result<(), DaemonError> {
        if self.admin_server_handle.is_some() {
            return Err(DaemonError::ShutdownError("server_handle already set".to_string()));
        }
        self.admin_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), DaemonError> {
        info!("Shutting down dockyard daemon...");
        let _ = self.shutdown_tx.send(());

        // 1. Admin server stops accepting requests
        if let Some(handle) = self.admin_server_handle.take() {
            handle
                .await
                .map_err(|e| DaemonError::ShutdownError(e.to_string()))??;
        }

        // 2. Workers drain the queue, cancelled past the shutdown delay
        if let Some(pool) = self.worker_pool.take() {
            pool.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
