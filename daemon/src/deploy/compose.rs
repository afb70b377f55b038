//! Container projects: compose projects and single Dockerfile images

use std::path::Path;

use tracing::debug;

use crate::deploy::log_sink::DeploymentLog;
use crate::deploy::process::{CommandRunner, CommandSpec};
use crate::errors::DaemonError;

/// Run a validated container start command under `project_name`
pub async fn container_up(
    runner: &dyn CommandRunner,
    start_command: &str,
    repo_path: &Path,
    project_name: &str,
    port: u16,
    log: &DeploymentLog,
) -> Result<(), DaemonError> {
    let spec = CommandSpec::from_command_line(start_command)?
        .current_dir(repo_path)
        .env("COMPOSE_PROJECT_NAME", project_name)
        .env("PORT", port);
    runner.run(&spec, log).await
}

/// Tear down the compose project `project_name`
pub async fn container_down(
    runner: &dyn CommandRunner,
    project_name: &str,
    log: &DeploymentLog,
) -> Result<(), DaemonError> {
    let spec = CommandSpec::new("docker-compose", ["-p", project_name, "down"]);
    if runner.run(&spec, log).await.is_ok() {
        return Ok(());
    }

    // Try 'docker compose' (newer version)
    debug!("docker-compose down failed, trying 'docker compose'...");
    let spec = CommandSpec::new("docker", ["compose", "-p", project_name, "down"]);
    runner.run(&spec, log).await
}

/// A `docker build` step tagged with the instance name; other steps pass through
pub fn image_build_spec(step: &str, name: &str) -> Result<CommandSpec, DaemonError> {
    let mut spec = CommandSpec::from_command_line(step)?;
    if spec.program == "docker" && spec.args.first().map(String::as_str) == Some("build") {
        spec.args.splice(1..1, ["-t".to_string(), name.to_string()]);
    }
    Ok(spec)
}

/// Run the image `name` as container `name`, publishing `port` to `container_port`
pub async fn image_run(
    runner: &dyn CommandRunner,
    start_command: &str,
    name: &str,
    port: u16,
    container_port: u16,
    log: &DeploymentLog,
) -> Result<(), DaemonError> {
    let mut spec = CommandSpec::from_command_line(start_command)?;
    spec.args.extend([
        "--name".to_string(),
        name.to_string(),
        "-p".to_string(),
        format!("{}:{}", port, container_port),
        name.to_string(),
    ]);
    runner.run(&spec.env("PORT", port), log).await
}

/// Force-remove the container `name`
pub async fn container_remove(
    runner: &dyn CommandRunner,
    name: &str,
    log: &DeploymentLog,
) -> Result<(), DaemonError> {
    runner
        .run(&CommandSpec::new("docker", ["rm", "-f", name]), log)
        .await
}
