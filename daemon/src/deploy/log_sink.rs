//! Per-deployment log artifact
//!
//! One append-only file per deployment at `{logs_dir}/{id}.log`. Step banners
//! and the raw stdout/stderr of every subprocess land in it in execution
//! order, so readers can tail it while the deployment is still running.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::warn;

use crate::errors::DaemonError;

/// Path of the log artifact for `deployment_id`
pub fn log_path(logs_dir: &Path, deployment_id: &str) -> PathBuf {
    logs_dir.join(format!("{}.log", deployment_id))
}

/// Append-only log sink for one deployment
#[derive(Debug)]
pub struct DeploymentLog {
    path: PathBuf,
    file: File,
}

impl DeploymentLog {
    /// Open (creating parents) the log at `path` for appending
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DaemonError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line; write errors are reported to the daemon log only
    pub fn line(&self, message: &str) {
        let mut file = &self.file;
        if let Err(e) = writeln!(file, "{}", message) {
            warn!("Failed to write to {}: {}", self.path.display(), e);
        }
    }

    /// A handle subprocesses can write stdout or stderr into
    pub fn stdio(&self) -> Result<Stdio, DaemonError> {
        Ok(Stdio::from(self.file.try_clone()?))
    }
}

/// Last `max_lines` lines of the log at `path`, empty if unreadable.
///
/// Invalid UTF-8 from subprocess output is replaced, not dropped.
pub fn tail(path: &Path, max_lines: usize) -> String {
    let Ok(bytes) = std::fs::read(path) else {
        return String::new();
    };
    let contents = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
