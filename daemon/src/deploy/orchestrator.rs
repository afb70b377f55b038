//! Per-deployment orchestration sequence
//!
//! sync -> checkout -> detect -> resolve port -> build -> displace -> start -> publish
//!
//! Every step before displace is fatal on failure. Displace is best effort.
//! Start falls back once from the supervisor to a direct launch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, warn};

use crate::deploy::instance::{instance_name, public_url};
use crate::deploy::log_sink::DeploymentLog;
use crate::deploy::ports::{allocate_port, DEFAULT_BASE_PORT};
use crate::deploy::process::{CommandRunner, CommandSpec};
use crate::deploy::validate::{validate_command, validate_path};
use crate::deploy::{compose, git, stage_error, supervisor};
use crate::detect::{Detection, DetectorManager, ProjectType};
use crate::errors::DaemonError;
use crate::models::deployment::Deployment;

/// Host-level inputs of the orchestration sequence
#[derive(Debug)]
pub struct OrchestratorOptions {
    /// Workspace root; checkouts live at `{repos_dir}/{owner}/{repo}/{environment}`
    pub repos_dir: PathBuf,
    pub deployment_domain: String,
    pub base_port: u16,
    pub github_token: Option<SecretString>,

    /// Port overrides keyed by `owner/repo`
    pub project_ports: HashMap<String, u16>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            repos_dir: PathBuf::from("repos"),
            deployment_domain: "localhost".to_string(),
            base_port: DEFAULT_BASE_PORT,
            github_token: None,
            project_ports: HashMap::new(),
        }
    }
}

/// Drives one deployment from repository sync to a running instance
pub struct Orchestrator {
    options: OrchestratorOptions,
    detector: DetectorManager,
    runner: Arc<dyn CommandRunner>,
}

impl Orchestrator {
    pub fn new(
        options: OrchestratorOptions,
        detector: DetectorManager,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            options,
            detector,
            runner,
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Checkout location of a deployment's repository, one per environment
    pub fn repo_path(&self, deployment: &Deployment) -> PathBuf {
        self.options
            .repos_dir
            .join(&deployment.owner)
            .join(&deployment.repo)
            .join(&deployment.environment)
    }

    /// Run the whole sequence, filling in the derived fields of `deployment`.
    ///
    /// Status transitions are left to the caller.
    pub async fn execute(
        &self,
        deployment: &mut Deployment,
        log: &DeploymentLog,
    ) -> Result<(), DaemonError> {
        let runner = self.runner.as_ref();
        let root = &self.options.repos_dir;
        let repo_path = self.repo_path(deployment);
        validate_path(&repo_path, root)?;

        log.line(&format!(
            "==> Deploying {} {} ({}) to {}",
            deployment.project(),
            deployment.git_ref,
            deployment.short_sha(),
            deployment.environment
        ));

        log.line("==> Syncing repository");
        git::sync_repository(
            runner,
            &deployment.clone_url,
            self.options.github_token.as_ref(),
            &repo_path,
            log,
        )
        .await?;
        git::checkout(runner, &repo_path, &deployment.sha, log).await?;

        log.line("==> Detecting project type");
        let detection = self.detect(&repo_path).await?;
        info!(
            "Deployment {} detected as {} (confidence {:.2})",
            deployment.id, detection.project_type, detection.confidence
        );
        log.line(&format!(
            "Detected {} (confidence {:.2})",
            detection.project_type, detection.confidence
        ));
        deployment.project_type = Some(detection.project_type.as_str().to_string());

        let port = self.resolve_port(deployment, &detection);
        deployment.port = Some(port);
        log.line(&format!("Using port {}", port));

        let name = instance_name(&deployment.owner, &deployment.repo, &deployment.environment);
        self.build(&detection, &name, &repo_path, port, log).await?;

        log.line(&format!("==> Stopping previous instance {}", name));
        self.displace(&name, log).await;

        log.line(&format!("==> Starting {}", name));
        self.start(&detection, &name, &repo_path, port, log).await?;

        let url = public_url(
            &deployment.environment,
            &deployment.repo,
            &self.options.deployment_domain,
        );
        log.line(&format!("==> Published at {}", url));
        deployment.url = Some(url);

        Ok(())
    }

    async fn detect(&self, repo_path: &Path) -> Result<Detection, DaemonError> {
        let detector = self.detector.clone();
        let path = repo_path.to_path_buf();
        tokio::task::spawn_blocking(move || detector.detect_project(&path))
            .await
            .map_err(|e| DaemonError::Internal(format!("detection task failed: {}", e)))
    }

    /// Detector port, else the per-project override, else an allocated one
    fn resolve_port(&self, deployment: &Deployment, detection: &Detection) -> u16 {
        detection
            .port
            .or_else(|| self.options.project_ports.get(&deployment.project()).copied())
            .unwrap_or_else(|| allocate_port(self.options.base_port, &deployment.environment))
    }

    async fn build(
        &self,
        detection: &Detection,
        name: &str,
        repo_path: &Path,
        port: u16,
        log: &DeploymentLog,
    ) -> Result<(), DaemonError> {
        if detection.build_commands.is_empty() {
            log.line("==> No build step");
            return Ok(());
        }

        log.line("==> Building");
        for step in &detection.build_commands {
            validate_command(step)?;
            validate_path(repo_path, &self.options.repos_dir)?;

            let spec = if detection.builds_image() {
                compose::image_build_spec(step, name)?
            } else {
                CommandSpec::from_command_line(step)?
            };
            let spec = spec
                .current_dir(repo_path)
                .clear_env()
                .env("PORT", port)
                .env("NODE_ENV", "production");
            self.runner
                .run(&spec, log)
                .await
                .map_err(stage_error(DaemonError::BuildFailed))?;
        }
        Ok(())
    }

    /// Best-effort stop of whatever runs under `name`, on both start paths
    async fn displace(&self, name: &str, log: &DeploymentLog) {
        let runner = self.runner.as_ref();
        supervisor::stop(runner, name, log).await;
        if let Err(e) = compose::container_down(runner, name, log).await {
            info!("No container project to stop for {}: {}", name, e);
        }
        if let Err(e) = compose::container_remove(runner, name, log).await {
            info!("No container to remove for {}: {}", name, e);
        }
    }

    async fn start(
        &self,
        detection: &Detection,
        name: &str,
        repo_path: &Path,
        port: u16,
        log: &DeploymentLog,
    ) -> Result<(), DaemonError> {
        let runner = self.runner.as_ref();
        let Some(start_command) = detection.start_command.as_deref() else {
            return Err(DaemonError::StartFailed(format!(
                "no start command for project type {}",
                detection.project_type
            )));
        };
        validate_command(start_command)?;
        validate_path(repo_path, &self.options.repos_dir)?;

        if detection.builds_image() {
            let container_port = detection.port.unwrap_or(port);
            return compose::image_run(runner, start_command, name, port, container_port, log)
                .await
                .map_err(stage_error(DaemonError::StartFailed));
        }
        if detection.project_type == ProjectType::Container {
            return compose::container_up(runner, start_command, repo_path, name, port, log)
                .await
                .map_err(stage_error(DaemonError::StartFailed));
        }

        match supervisor::start(runner, start_command, name, repo_path, port, log).await {
            Ok(()) => Ok(()),
            Err(e @ DaemonError::Cancelled(_)) => Err(e),
            Err(e) => {
                warn!("Supervisor start of {} failed, launching directly: {}", name, e);
                log.line(&format!("Supervisor start failed ({}), launching directly", e));
                supervisor::launch_direct(runner, start_command, repo_path, port, log)
                    .await
                    .map_err(stage_error(DaemonError::StartFailed))
            }
        }
    }
}
