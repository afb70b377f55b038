//! Non-container instances under the pm2 process supervisor

use std::path::Path;

use crate::deploy::log_sink::DeploymentLog;
use crate::deploy::process::{CommandRunner, CommandSpec};
use crate::errors::DaemonError;

pub const SUPERVISOR: &str = "pm2";

/// Start `start_command` as supervisor instance `name`.
///
/// The program is the supervised script and the remaining words are passed
/// through after `--`, so nothing is interpreted by a shell.
pub async fn start(
    runner: &dyn CommandRunner,
    start_command: &str,
    name: &str,
    repo_path: &Path,
    port: u16,
    log: &DeploymentLog,
) -> Result<(), DaemonError> {
    let command = CommandSpec::from_command_line(start_command)?;

    let mut args = vec![
        "start".to_string(),
        command.program,
        "--name".to_string(),
        name.to_string(),
        "--no-autorestart".to_string(),
    ];
    if !command.args.is_empty() {
        args.push("--".to_string());
        args.extend(command.args);
    }

    let spec = with_app_env(CommandSpec::new(SUPERVISOR, args), repo_path, port);
    runner.run(&spec, log).await
}

/// Stop and forget instance `name`; both steps are best effort
pub async fn stop(runner: &dyn CommandRunner, name: &str, log: &DeploymentLog) {
    let _ = runner
        .run(&CommandSpec::new(SUPERVISOR, ["stop", name]), log)
        .await;
    let _ = runner
        .run(&CommandSpec::new(SUPERVISOR, ["delete", name]), log)
        .await;
}

/// Launch `start_command` directly, without the supervisor
pub async fn launch_direct(
    runner: &dyn CommandRunner,
    start_command: &str,
    repo_path: &Path,
    port: u16,
    log: &DeploymentLog,
) -> Result<(), DaemonError> {
    let spec = with_app_env(CommandSpec::from_command_line(start_command)?, repo_path, port);
    runner.launch(&spec, log).await
}

fn with_app_env(spec: CommandSpec, repo_path: &Path, port: u16) -> CommandSpec {
    spec.current_dir(repo_path)
        .env("PORT", port)
        .env("NODE_ENV", "production")
}
