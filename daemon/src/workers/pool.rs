//! Fixed-size pool of deployment workers

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::deploy::process::CancelHandle;
use crate::errors::DaemonError;
use crate::workers::deployer::{self, WorkerContext};

/// Worker pool options
#[derive(Debug, Clone)]
pub struct Options {
    /// Number of deployments processed concurrently
    pub workers: usize,

    /// How long shutdown waits for workers to drain before cancelling them
    pub max_shutdown_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            workers: 5,
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Running workers plus the means to stop them
pub struct WorkerPool {
    options: Options,
    ctx: Arc<WorkerContext>,
    cancel: CancelHandle,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `options.workers` workers pulling from `ctx.queue`.
    ///
    /// `cancel` must be the handle paired with `ctx.cancel` and with the
    /// orchestrator's command runner.
    pub fn start(options: Options, ctx: Arc<WorkerContext>, cancel: CancelHandle) -> Self {
        let workers = options.workers.max(1);
        info!("Starting {} deployment workers...", workers);

        let handles = (0..workers)
            .map(|worker_id| tokio::spawn(deployer::run(worker_id, ctx.clone())))
            .collect();

        Self {
            options,
            ctx,
            cancel,
            handles,
        }
    }

    pub fn context(&self) -> &Arc<WorkerContext> {
        &self.ctx
    }

    /// Close the queue and wait for the workers to drain it.
    ///
    /// Past `max_shutdown_delay` the cancellation signal is raised: running
    /// subprocesses are killed best effort and whatever is left fails as
    /// cancelled.
    pub async fn shutdown(mut self) -> Result<(), DaemonError> {
        self.ctx.queue.close();

        let mut joined = join_all(std::mem::take(&mut self.handles));
        let results = match tokio::time::timeout(self.options.max_shutdown_delay, &mut joined).await {
            Ok(results) => results,
            Err(_) => {
                warn!(
                    "Workers still busy after {:?}, cancelling in-flight deployments...",
                    self.options.max_shutdown_delay
                );
                self.cancel.cancel();
                joined.await
            }
        };

        let mut failure = None;
        for result in results {
            if let Err(e) = result {
                error!("Deployment worker panicked: {}", e);
                failure = Some(DaemonError::ShutdownError(e.to_string()));
            }
        }

        info!("Deployment workers stopped");
        failure.map_or(Ok(()), Err)
    }
}
