//! Application configuration options

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::deploy::orchestrator::OrchestratorOptions;
use crate::deploy::ports::DEFAULT_BASE_PORT;
use crate::errors::DaemonError;
use crate::integrations::{Collaborators, GitHubStatusTracker, WebhookNotifier};
use crate::storage::deployments::DeploymentStore;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::pool;
use crate::workers::queue::DEFAULT_QUEUE_CAPACITY;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Workspace root for repository checkouts
    pub repos_dir: PathBuf,

    /// Per-deployment log artifacts
    pub logs_dir: PathBuf,

    /// Deployment records
    pub data_dir: PathBuf,

    pub deployment_domain: String,
    pub base_port: u16,
    pub queue_capacity: usize,

    /// Port overrides keyed by `owner/repo`
    pub project_ports: HashMap<String, u16>,

    pub github_token: Option<SecretString>,
    pub webhook_secret: Option<SecretString>,
    pub discord_webhook_url: Option<String>,
    pub n8n_webhook_url: Option<String>,

    /// Worker pool options
    pub deployer: pool::Options,

    /// Enable the local admin server
    pub enable_admin_server: bool,

    /// Server configuration
    pub server: ServerOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        let layout = StorageLayout::default();
        Self {
            repos_dir: layout.repos_dir().path().to_path_buf(),
            logs_dir: layout.logs_dir().path().to_path_buf(),
            data_dir: layout.data_dir().path().to_path_buf(),
            layout,
            deployment_domain: "localhost".to_string(),
            base_port: DEFAULT_BASE_PORT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            project_ports: HashMap::new(),
            github_token: None,
            webhook_secret: None,
            discord_webhook_url: None,
            n8n_webhook_url: None,
            deployer: pool::Options::default(),
            enable_admin_server: true,
            server: ServerOptions::default(),
        }
    }
}

impl AppOptions {
    /// Resolve loaded settings against the storage layout
    pub fn from_settings(layout: StorageLayout, settings: Settings) -> Self {
        let project_ports = settings.project_ports();
        Self {
            repos_dir: settings
                .repos_dir
                .unwrap_or_else(|| layout.repos_dir().path().to_path_buf()),
            logs_dir: settings
                .logs_dir
                .unwrap_or_else(|| layout.logs_dir().path().to_path_buf()),
            data_dir: settings
                .data_dir
                .unwrap_or_else(|| layout.data_dir().path().to_path_buf()),
            layout,
            deployment_domain: settings.deployment_domain,
            base_port: settings.base_port,
            queue_capacity: settings.queue_capacity,
            project_ports,
            github_token: settings.github_token,
            webhook_secret: settings.webhook_secret,
            discord_webhook_url: settings.discord_webhook_url,
            n8n_webhook_url: settings.n8n_webhook_url,
            deployer: pool::Options {
                workers: settings.max_concurrent_deployments,
                ..pool::Options::default()
            },
            enable_admin_server: settings.enable_admin_server,
            server: ServerOptions {
                host: settings.server.host,
                port: settings.server.port,
            },
        }
    }

    /// Orchestrator inputs; the token is copied so the tracker can keep its own
    pub fn orchestrator(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            repos_dir: self.repos_dir.clone(),
            deployment_domain: self.deployment_domain.clone(),
            base_port: self.base_port,
            github_token: self.github_token.as_ref().map(copy_secret),
            project_ports: self.project_ports.clone(),
        }
    }

    /// Store plus whichever external reporters are configured
    pub fn collaborators(
        &self,
        store: Arc<dyn DeploymentStore>,
    ) -> Result<Collaborators, DaemonError> {
        let mut collaborators = Collaborators::with_store(store);
        if let Some(token) = &self.github_token {
            info!("GitHub deployment status updates enabled");
            collaborators =
                collaborators.tracker(Arc::new(GitHubStatusTracker::new(copy_secret(token))?));
        }
        if let Some(notifier) = WebhookNotifier::from_urls(
            self.discord_webhook_url.clone(),
            self.n8n_webhook_url.clone(),
        )? {
            info!("Deployment notifications enabled");
            collaborators = collaborators.notifier(Arc::new(notifier));
        }
        Ok(collaborators)
    }
}

pub(crate) fn copy_secret(secret: &SecretString) -> SecretString {
    use secrecy::ExposeSecret;
    SecretString::from(secret.expose_secret().to_string())
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}
