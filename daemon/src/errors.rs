//! Error types for the dockyard daemon

use thiserror::Error;

/// Main error type for the daemon
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A remote endpoint answered with a non-success status
    #[error("HTTP status {0}: {1}")]
    HttpStatus(u16, String),

    /// Unsafe command text or path; raised before any process runs
    #[error("Validation rejected: {0}")]
    ValidationRejected(String),

    #[error("Repository sync failed: {0}")]
    SyncFailed(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Start failed: {0}")]
    StartFailed(String),

    /// A subprocess could not be spawned or exited unsuccessfully
    #[error("Process failed: {0}")]
    ProcessFailed(String),

    /// Admission control, not a deployment failure
    #[error("Deployment queue is full")]
    QueueFull,

    #[error("Deployment queue is closed")]
    QueueClosed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Deployment cancelled: {0}")]
    Cancelled(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DaemonError {
    fn from(err: anyhow::Error) -> Self {
        DaemonError::Internal(err.to_string())
    }
}
