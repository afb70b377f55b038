//! Finite state machine for the deployment status field
//!
//! Status only ever moves forward: `queued -> in_progress -> {success, failed}`.
//! Every transition is driven by a [`DeploymentEvent`]; anything else is
//! rejected and leaves the status untouched.

use serde::{Deserialize, Serialize};

use crate::errors::DaemonError;

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Accepted into the queue, not yet claimed by a worker
    Queued,

    /// Claimed by a worker
    InProgress,

    /// Instance started and URL published
    Success,

    /// Terminal failure at any step
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Queued => "queued",
            DeploymentStatus::InProgress => "in_progress",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
        }
    }

    /// Whether the status is `success` or `failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }

    /// Whether a start time must be recorded in this status
    pub fn is_started(&self) -> bool {
        !matches!(self, DeploymentStatus::Queued)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// A worker picked the deployment off the queue
    Claim,

    /// Every orchestration step completed
    Succeed,

    /// A step failed terminally
    Fail(String),
}

/// Compute the status reached by applying `event` in `state`
pub fn transition(
    state: DeploymentStatus,
    event: &DeploymentEvent,
) -> Result<DeploymentStatus, DaemonError> {
    let next = match (state, event) {
        (DeploymentStatus::Queued, DeploymentEvent::Claim) => DeploymentStatus::InProgress,
        (DeploymentStatus::InProgress, DeploymentEvent::Succeed) => DeploymentStatus::Success,
        (DeploymentStatus::InProgress, DeploymentEvent::Fail(_)) => DeploymentStatus::Failed,

        (state, event) => {
            return Err(DaemonError::InvalidTransition(format!(
                "{:?} -> {:?}",
                state, event
            )));
        }
    };
    Ok(next)
}
