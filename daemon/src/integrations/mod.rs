//! Best-effort collaborators notified about deployment progress
//!
//! Failures in here are logged by the caller and never change a deployment's
//! outcome.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::DaemonError;
use crate::models::deployment::Deployment;
use crate::storage::deployments::DeploymentStore;

pub mod github;
pub mod notify;

pub use github::GitHubStatusTracker;
pub use notify::WebhookNotifier;

/// Deployment state as reported to the status tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    InProgress,
    Success,
    Failure,
}

impl TrackerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::InProgress => "in_progress",
            TrackerState::Success => "success",
            TrackerState::Failure => "failure",
        }
    }
}

/// External deployment status tracking (GitHub deployments and PR comments)
#[async_trait]
pub trait StatusTracker: Send + Sync {
    /// Register a deployment of `sha` to `environment`, returning its external id
    async fn create_deployment(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        environment: &str,
    ) -> Result<i64, DaemonError>;

    async fn update_deployment_status(
        &self,
        owner: &str,
        repo: &str,
        external_id: i64,
        state: TrackerState,
        url: Option<&str>,
        description: &str,
    ) -> Result<(), DaemonError>;

    async fn add_pr_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<(), DaemonError>;
}

/// What a notification says about a deployment
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub project: String,
    pub environment: String,
    pub git_ref: String,
    pub sha: String,
    pub duration_secs: f64,
}

impl Notice {
    pub fn for_deployment(deployment: &Deployment) -> Self {
        Self {
            project: deployment.project(),
            environment: deployment.environment.clone(),
            git_ref: deployment.git_ref.clone(),
            sha: deployment.sha.clone(),
            duration_secs: deployment.duration_secs(),
        }
    }
}

/// Outbound notifications (chat and automation webhooks)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_deployment_success(&self, notice: &Notice, url: &str) -> Result<(), DaemonError>;

    async fn send_deployment_failure(
        &self,
        notice: &Notice,
        error: &str,
        log_snippet: &str,
    ) -> Result<(), DaemonError>;
}

/// Everything the worker pool reports to besides the deployment log
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DeploymentStore>,
    pub tracker: Option<Arc<dyn StatusTracker>>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Collaborators {
    /// Only a store; nothing is reported externally
    pub fn with_store(store: Arc<dyn DeploymentStore>) -> Self {
        Self {
            store,
            tracker: None,
            notifier: None,
        }
    }

    pub fn tracker(mut self, tracker: Arc<dyn StatusTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}
