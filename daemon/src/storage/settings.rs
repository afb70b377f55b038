//! Settings file management

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::errors::DaemonError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Daemon settings, read from `settings.json`.
///
/// Every field has a default, so `{}` is a valid settings file.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit the daemon log as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Workspace root for repository checkouts
    #[serde(default)]
    pub repos_dir: Option<PathBuf>,

    /// Per-deployment logs and the daemon log
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,

    /// Deployment records
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Domain that public URLs are published under
    #[serde(default = "default_deployment_domain")]
    pub deployment_domain: String,

    /// Worker pool size
    #[serde(default = "default_max_concurrent_deployments")]
    pub max_concurrent_deployments: usize,

    /// Pending deployments accepted before enqueue reports the queue as full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Base of the allocated port range
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Token used for cloning and for deployment status updates
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub github_token: Option<SecretString>,

    /// Shared secret of the GitHub webhook; deliveries are refused without it
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub webhook_secret: Option<SecretString>,

    #[serde(default)]
    pub discord_webhook_url: Option<String>,

    #[serde(default)]
    pub n8n_webhook_url: Option<String>,

    /// Local admin server
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default = "default_true")]
    pub enable_admin_server: bool,

    /// Per-project overrides keyed by `owner/repo`
    #[serde(default)]
    pub projects: HashMap<String, ProjectSettings>,
}

fn default_true() -> bool {
    true
}

fn default_deployment_domain() -> String {
    "localhost".to_string()
}

fn default_max_concurrent_deployments() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    100
}

fn default_base_port() -> u16 {
    3000
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()).map(SecretString::from))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            repos_dir: None,
            logs_dir: None,
            data_dir: None,
            deployment_domain: default_deployment_domain(),
            max_concurrent_deployments: default_max_concurrent_deployments(),
            queue_capacity: default_queue_capacity(),
            base_port: default_base_port(),
            github_token: None,
            webhook_secret: None,
            discord_webhook_url: None,
            n8n_webhook_url: None,
            server: ServerSettings::default(),
            enable_admin_server: true,
            projects: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load `file`, falling back to defaults when it does not exist, then
    /// apply environment overrides
    pub async fn load(file: &File) -> Result<Self, DaemonError> {
        let mut settings = if file.exists().await {
            file.read_json::<Settings>().await.map_err(|e| {
                DaemonError::ConfigError(format!(
                    "invalid settings file {}: {}",
                    file.path().display(),
                    e
                ))
            })?
        } else {
            info!(
                "Settings file {} not found, using defaults",
                file.path().display()
            );
            Settings::default()
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Override fields from the environment, looked up through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), DaemonError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("GITHUB_TOKEN") {
            self.github_token = Some(SecretString::from(token));
        }
        if let Some(secret) = lookup("GITHUB_WEBHOOK_SECRET") {
            self.webhook_secret = Some(SecretString::from(secret));
        }
        if let Some(domain) = lookup("DEPLOYMENT_DOMAIN") {
            self.deployment_domain = domain;
        }
        if let Some(url) = lookup("DISCORD_WEBHOOK_URL") {
            self.discord_webhook_url = Some(url);
        }
        if let Some(url) = lookup("N8N_WEBHOOK_URL") {
            self.n8n_webhook_url = Some(url);
        }
        if let Some(max) = lookup("MAX_CONCURRENT_DEPLOYMENTS") {
            self.max_concurrent_deployments = max.trim().parse().map_err(|_| {
                DaemonError::ConfigError(format!("invalid MAX_CONCURRENT_DEPLOYMENTS: {}", max))
            })?;
        }

        if self.max_concurrent_deployments == 0 {
            return Err(DaemonError::ConfigError(
                "max_concurrent_deployments must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(DaemonError::ConfigError(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Port overrides keyed by `owner/repo`
    pub fn project_ports(&self) -> HashMap<String, u16> {
        self.projects
            .iter()
            .filter_map(|(project, settings)| settings.port.map(|port| (project.clone(), port)))
            .collect()
    }
}

/// Local admin server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8001
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Per-project overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub port: Option<u16>,
}
