//! Dockyard - Entry Point
//!
//! Deployment daemon for a single host. Queues deployment requests, detects
//! how each project is built and started, and runs it under a supervisor.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use dockyard::app::options::AppOptions;
use dockyard::app::run::{deploy_once, run, status_report};
use dockyard::filesys::file::File;
use dockyard::logs::{init_logging, LogOptions};
use dockyard::models::deployment::Deployment;
use dockyard::storage::layout::StorageLayout;
use dockyard::storage::settings::Settings;
use dockyard::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version: {}", e),
        }
        return;
    }

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings_file = match cli_args.get("settings") {
        Some(path) => File::new(PathBuf::from(path)),
        None => layout.settings_file(),
    };
    let settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to load settings: {}", e);
            std::process::exit(1);
        }
    };

    let log_level = settings.log_level.clone();
    let log_json = settings.log_json;
    let options = AppOptions::from_settings(layout, settings);

    // Initialize logging
    let log_options = LogOptions {
        log_level,
        json_format: log_json,
        log_dir: Some(options.logs_dir.clone()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    if cli_args.contains_key("status") {
        match print_status(&cli_args, &options).await {
            Ok(report) => println!("{}", report),
            Err(e) => {
                error!("{:#}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if cli_args.contains_key("deploy") {
        let deployment = match deployment_from_args(&cli_args) {
            Ok(deployment) => deployment,
            Err(e) => {
                error!("{:#}", e);
                error!("Run: dockyard --deploy --owner=<owner> --repo=<repo> --sha=<sha> [--ref=<ref>]");
                std::process::exit(2);
            }
        };

        match deploy_once(version.version, options, deployment)
            .await
            .context("deployment could not be run")
            .and_then(|record| {
                serde_json::to_string_pretty(&record).context("failed to render deployment")
            }) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("{:#}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    info!("Running dockyard with options: {:?}", options);
    let result = run(version.version, options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the daemon: {e}");
        std::process::exit(1);
    }
}

/// Recent deployments from the record store, `--limit` rows (default 10)
async fn print_status(
    cli_args: &HashMap<String, String>,
    options: &AppOptions,
) -> anyhow::Result<String> {
    let limit = match cli_args.get("limit") {
        Some(limit) => limit
            .parse::<usize>()
            .with_context(|| format!("invalid --limit: {}", limit))?,
        None => 10,
    };
    status_report(options, limit)
        .await
        .with_context(|| format!("failed to read deployments from {}", options.data_dir.display()))
}

fn deployment_from_args(cli_args: &HashMap<String, String>) -> anyhow::Result<Deployment> {
    let required = |key: &str| {
        cli_args
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("--{} is required with --deploy", key))
    };

    let git_ref = cli_args
        .get("ref")
        .cloned()
        .unwrap_or_else(|| "refs/heads/main".to_string());
    let mut deployment = Deployment::new(required("owner")?, required("repo")?, git_ref, required("sha")?);

    if let Some(clone_url) = cli_args.get("clone-url") {
        deployment = deployment.with_clone_url(clone_url.clone());
    }
    if let Some(environment) = cli_args.get("environment") {
        deployment = deployment.with_environment(environment.clone());
    }
    Ok(deployment)
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
