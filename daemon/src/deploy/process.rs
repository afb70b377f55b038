//! External process execution
//!
//! Commands are always executed as an argument vector. Command lines coming
//! from detection are split on whitespace and never handed to a shell.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::deploy::log_sink::DeploymentLog;
use crate::errors::DaemonError;

/// Variables passed through when a command runs with a cleared environment
pub const INHERITED_ENV: &[&str] = &["PATH", "HOME", "LANG", "USER"];

/// How long a directly launched process is watched before it counts as started
pub const DEFAULT_LAUNCH_GRACE: Duration = Duration::from_secs(2);

/// A command to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,

    /// Start from an empty environment plus [`INHERITED_ENV`]
    pub clear_env: bool,

    /// Shown instead of the argument vector, for commands carrying credentials
    pub label: Option<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            clear_env: false,
            label: None,
        }
    }

    /// Split a validated command line on whitespace
    pub fn from_command_line(line: &str) -> Result<Self, DaemonError> {
        let mut parts = line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DaemonError::ValidationRejected("empty command not allowed".into()))?;
        Ok(Self::new(program, parts))
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: &str, value: impl ToString) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn to_command(&self, log: &DeploymentLog) -> Result<Command, DaemonError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        if self.clear_env {
            cmd.env_clear();
            for key in INHERITED_ENV {
                if let Ok(value) = std::env::var(key) {
                    cmd.env(key, value);
                }
            }
        }
        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(Stdio::null())
            .stdout(log.stdio()?)
            .stderr(log.stdio()?);
        Ok(cmd)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            return f.write_str(label);
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Receiving side of the pool-wide cancellation signal
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// Sending side of the pool-wide cancellation signal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked cancellation pair
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Cancellation {
    /// A signal that is never raised
    pub fn never() -> Self {
        // a dropped sender leaves the flag false and `cancelled` pending
        let (_handle, cancellation) = cancellation();
        cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised; pends forever if it never can be
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Executes external commands on behalf of the orchestrator
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion with output appended to `log`; non-zero exit is an error
    async fn run(&self, spec: &CommandSpec, log: &DeploymentLog) -> Result<(), DaemonError>;

    /// Launch a long-running process without a supervisor.
    ///
    /// Succeeds if the process is still running (or exited cleanly) after a
    /// short grace period.
    async fn launch(&self, spec: &CommandSpec, log: &DeploymentLog) -> Result<(), DaemonError>;
}

/// Runs commands as real child processes
pub struct SystemRunner {
    cancel: Cancellation,
    launch_grace: Duration,
}

impl SystemRunner {
    pub fn new(cancel: Cancellation) -> Self {
        Self {
            cancel,
            launch_grace: DEFAULT_LAUNCH_GRACE,
        }
    }

    pub fn with_launch_grace(mut self, grace: Duration) -> Self {
        self.launch_grace = grace;
        self
    }

    fn check_cancelled(&self, spec: &CommandSpec) -> Result<(), DaemonError> {
        if self.cancel.is_cancelled() {
            return Err(DaemonError::Cancelled(format!("not starting `{}`", spec)));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec, log: &DeploymentLog) -> Result<(), DaemonError> {
        self.check_cancelled(spec)?;
        log.line(&format!("Running: {}", spec));
        debug!("Running: {}", spec);

        let mut child = spec
            .to_command(log)?
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DaemonError::ProcessFailed(format!("failed to run `{}`: {}", spec, e)))?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(DaemonError::ProcessFailed(format!("`{}` exited with {}", spec, status)))
                }
            }
            _ = self.cancel.cancelled() => {
                // best effort, the child may ignore the signal
                let _ = child.start_kill();
                log.line(&format!("Cancelled: {}", spec));
                Err(DaemonError::Cancelled(format!("`{}` interrupted", spec)))
            }
        }
    }

    async fn launch(&self, spec: &CommandSpec, log: &DeploymentLog) -> Result<(), DaemonError> {
        self.check_cancelled(spec)?;
        log.line(&format!("Launching: {}", spec));

        let mut child = spec
            .to_command(log)?
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| DaemonError::ProcessFailed(format!("failed to launch `{}`: {}", spec, e)))?;

        let waited = tokio::time::timeout(self.launch_grace, child.wait()).await;
        match waited {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(DaemonError::ProcessFailed(format!(
                "`{}` exited with {}",
                spec, status
            ))),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                let name = spec.to_string();
                info!("Launched `{}` (pid {:?})", name, child.id());
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) => info!("`{}` exited with {}", name, status),
                        Err(e) => warn!("Failed to wait on `{}`: {}", name, e),
                    }
                });
                Ok(())
            }
        }
    }
}
