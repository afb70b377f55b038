//! Admin API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Request to queue a deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployRequest {
    pub owner: String,
    pub repo: String,
    pub sha: String,

    /// Git ref, defaults to `refs/heads/main`
    #[serde(default)]
    pub git_ref: Option<String>,

    /// Clone URL, defaults to the GitHub HTTPS URL of owner/repo
    #[serde(default)]
    pub clone_url: Option<String>,

    /// Explicit environment, otherwise derived from the ref or PR number
    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub pr_number: Option<u64>,

    /// External deployment tracking id (e.g. a GitHub deployment id)
    #[serde(default)]
    pub external_id: Option<i64>,
}

/// Response to a queued deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub id: String,
    pub status: String,
    pub environment: String,
    pub log_path: String,
}

/// Reply to a GitHub webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub message: String,

    /// Set when the delivery queued a deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeployResponse>,
}

/// Deployment summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub id: String,
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    pub sha: String,
    pub environment: String,
    pub status: String,
    pub project_type: Option<String>,
    pub port: Option<u16>,
    pub url: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Deployment list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentListResponse {
    pub deployments: Vec<DeploymentSummary>,
    pub total: usize,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
