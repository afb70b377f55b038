//! Deployment record storage

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::deploy::fsm::DeploymentStatus;
use crate::errors::DaemonError;
use crate::filesys::dir::Dir;
use crate::models::deployment::Deployment;

/// Durable storage of deployment records.
///
/// `create` and `update` are upserts keyed by the deployment id.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn create(&self, deployment: &Deployment) -> Result<(), DaemonError>;

    async fn update(&self, deployment: &Deployment) -> Result<(), DaemonError>;

    async fn get(&self, id: &str) -> Result<Deployment, DaemonError>;

    /// Newest first, at most `limit` records
    async fn list(&self, limit: usize) -> Result<Vec<Deployment>, DaemonError>;

    /// Records still queued or in progress
    async fn active(&self) -> Result<Vec<Deployment>, DaemonError>;
}

fn sort_key(deployment: &Deployment) -> DateTime<Utc> {
    deployment.started_at().unwrap_or_else(|| deployment.created_at())
}

fn newest_first(mut deployments: Vec<Deployment>, limit: usize) -> Vec<Deployment> {
    deployments.sort_by_key(|d| std::cmp::Reverse(sort_key(d)));
    deployments.truncate(limit);
    deployments
}

fn is_active(deployment: &Deployment) -> bool {
    matches!(
        deployment.status(),
        DeploymentStatus::Queued | DeploymentStatus::InProgress
    )
}

// =============================== JSON FILES ================================== //

/// One pretty-printed JSON file per deployment, `{dir}/{id}.json`
#[derive(Debug, Clone)]
pub struct JsonDeploymentStore {
    dir: Dir,
}

impl JsonDeploymentStore {
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    fn file_name(id: &str) -> Result<String, DaemonError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(DaemonError::NotFound(format!("deployment {}", id)));
        }
        Ok(format!("{}.json", id))
    }

    async fn read_all(&self) -> Result<Vec<Deployment>, DaemonError> {
        let mut deployments = Vec::new();
        for path in self.dir.list_files("json").await? {
            let file = crate::filesys::file::File::new(&path);
            match file.read_json::<Deployment>().await {
                Ok(deployment) => deployments.push(deployment),
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }
        Ok(deployments)
    }
}

#[async_trait]
impl DeploymentStore for JsonDeploymentStore {
    async fn create(&self, deployment: &Deployment) -> Result<(), DaemonError> {
        self.update(deployment).await
    }

    async fn update(&self, deployment: &Deployment) -> Result<(), DaemonError> {
        let file = self.dir.file(&Self::file_name(&deployment.id)?);
        file.write_json(deployment)
            .await
            .map_err(|e| DaemonError::StorageError(format!("failed to write {}: {}", deployment.id, e)))
    }

    async fn get(&self, id: &str) -> Result<Deployment, DaemonError> {
        let file = self.dir.file(&Self::file_name(id)?);
        if !file.exists().await {
            return Err(DaemonError::NotFound(format!("deployment {}", id)));
        }
        file.read_json().await
    }

    async fn list(&self, limit: usize) -> Result<Vec<Deployment>, DaemonError> {
        Ok(newest_first(self.read_all().await?, limit))
    }

    async fn active(&self) -> Result<Vec<Deployment>, DaemonError> {
        let mut deployments = self.read_all().await?;
        deployments.retain(is_active);
        Ok(newest_first(deployments, usize::MAX))
    }
}

// ================================= MEMORY ==================================== //

/// In-process store for one-shot runs and tests
#[derive(Debug, Default)]
pub struct MemoryDeploymentStore {
    records: Mutex<HashMap<String, Deployment>>,
}

impl MemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, Deployment>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DeploymentStore for MemoryDeploymentStore {
    async fn create(&self, deployment: &Deployment) -> Result<(), DaemonError> {
        self.update(deployment).await
    }

    async fn update(&self, deployment: &Deployment) -> Result<(), DaemonError> {
        self.records()
            .insert(deployment.id.clone(), deployment.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Deployment, DaemonError> {
        self.records()
            .get(id)
            .cloned()
            .ok_or_else(|| DaemonError::NotFound(format!("deployment {}", id)))
    }

    async fn list(&self, limit: usize) -> Result<Vec<Deployment>, DaemonError> {
        let all = self.records().values().cloned().collect();
        Ok(newest_first(all, limit))
    }

    async fn active(&self) -> Result<Vec<Deployment>, DaemonError> {
        let active = self.records().values().filter(|d| is_active(d)).cloned().collect();
        Ok(newest_first(active, usize::MAX))
    }
}
