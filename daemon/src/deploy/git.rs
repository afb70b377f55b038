//! Git repository sync

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use url::Url;

use crate::deploy::log_sink::DeploymentLog;
use crate::deploy::stage_error;
use crate::deploy::process::{CommandRunner, CommandSpec};
use crate::errors::DaemonError;

/// Clone the repository into `repo_path`, or fetch if a checkout already exists
pub async fn sync_repository(
    runner: &dyn CommandRunner,
    clone_url: &str,
    token: Option<&SecretString>,
    repo_path: &Path,
    log: &DeploymentLog,
) -> Result<(), DaemonError> {
    info!("Syncing Git repository {} into {}", clone_url, repo_path.display());

    if repo_path.join(".git").exists() {
        debug!("Checkout exists, fetching updates...");
        log.line("Updating existing repository...");
        let spec = CommandSpec::new("git", ["fetch", "--all"]).current_dir(repo_path);
        return runner
            .run(&spec, log)
            .await
            .map_err(stage_error(DaemonError::SyncFailed));
    }

    log.line("Cloning repository...");
    if let Some(parent) = repo_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            DaemonError::SyncFailed(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }

    let target = repo_path.to_string_lossy().to_string();
    let spec = CommandSpec::new(
        "git",
        [
            "clone".to_string(),
            "--".to_string(),
            authenticated_url(clone_url, token),
            target.clone(),
        ],
    )
    .label(format!("git clone {} {}", clone_url, target));

    runner
        .run(&spec, log)
        .await
        .map_err(stage_error(DaemonError::SyncFailed))
}

/// Check out exactly `sha`
pub async fn checkout(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    sha: &str,
    log: &DeploymentLog,
) -> Result<(), DaemonError> {
    log.line(&format!("Checking out {}...", sha));
    let spec = CommandSpec::new("git", ["checkout", "--detach", sha]).current_dir(repo_path);
    runner
        .run(&spec, log)
        .await
        .map_err(stage_error(DaemonError::SyncFailed))
}

/// Embed the access token as the user of an HTTPS clone URL.
///
/// Other URL forms (ssh, local paths) are returned unchanged.
pub fn authenticated_url(clone_url: &str, token: Option<&SecretString>) -> String {
    let Some(token) = token else {
        return clone_url.to_string();
    };

    match Url::parse(clone_url) {
        Ok(mut url) if url.scheme() == "https" => {
            if url.set_username(token.expose_secret()).is_err() {
                return clone_url.to_string();
            }
            url.to_string()
        }
        _ => clone_url.to_string(),
    }
}
