//! Bounded deployment queue with non-blocking admission

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::info;

use crate::deploy::log_sink::log_path;
use crate::deploy::validate::validate_request;
use crate::errors::DaemonError;
use crate::models::deployment::Deployment;
use crate::storage::deployments::DeploymentStore;

/// Default number of pending deployments accepted
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// FIFO of queued deployments shared by the producers and the worker pool
pub struct DeploymentQueue {
    tx: Mutex<Option<mpsc::Sender<Deployment>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Deployment>>,
    pending: AtomicUsize,
    capacity: usize,
    store: Arc<dyn DeploymentStore>,
    logs_dir: PathBuf,
}

impl DeploymentQueue {
    pub fn new(capacity: usize, store: Arc<dyn DeploymentStore>, logs_dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            pending: AtomicUsize::new(0),
            capacity: capacity.max(1),
            store,
            logs_dir: logs_dir.into(),
        }
    }

    /// Admit `deployment` without waiting.
    ///
    /// On success the id and log path have been filled in and the record has
    /// been persisted. On any error `deployment` is left untouched.
    pub async fn enqueue(&self, deployment: &mut Deployment) -> Result<(), DaemonError> {
        validate_request(deployment)?;

        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(DaemonError::QueueClosed)?;

        // reserve first so a full queue never persists or mutates anything
        let permit = tx.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => DaemonError::QueueFull,
            TrySendError::Closed(()) => DaemonError::QueueClosed,
        })?;

        let mut record = deployment.clone();
        record.id = record.generate_id(Utc::now());
        record.log_path = Some(log_path(&self.logs_dir, &record.id));

        self.store.create(&record).await?;

        self.pending.fetch_add(1, Ordering::SeqCst);
        permit.send(record.clone());
        info!("Queued deployment {} ({})", record.id, record.environment);

        *deployment = record;
        Ok(())
    }

    /// Next queued deployment; `None` once the queue is closed and drained
    pub async fn next(&self) -> Option<Deployment> {
        let deployment = self.rx.lock().await.recv().await;
        if deployment.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        deployment
    }

    /// Refuse new entries; already queued ones are still handed out
    pub fn close(&self) {
        if self.tx.lock().unwrap_or_else(|e| e.into_inner()).take().is_some() {
            info!("Deployment queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    /// Deployments waiting for a worker
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
