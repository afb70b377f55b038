//! GitHub deployment statuses and pull-request comments

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::DaemonError;
use crate::http::client::HttpClient;
use crate::integrations::{StatusTracker, TrackerState};
use crate::models::deployment::SHORT_SHA_LEN;

pub const GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Serialize)]
struct CreateDeploymentRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    environment: &'a str,
    description: String,
    auto_merge: bool,
    required_contexts: [&'a str; 0],
}

#[derive(Debug, Deserialize)]
struct CreatedDeployment {
    id: i64,
}

#[derive(Debug, Serialize)]
struct DeploymentStatusRequest<'a> {
    state: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

/// [`StatusTracker`] backed by the GitHub REST API
pub struct GitHubStatusTracker {
    client: HttpClient,
    base_url: String,
    token: SecretString,
}

impl GitHubStatusTracker {
    pub fn new(token: SecretString) -> Result<Self, DaemonError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: GITHUB_API_URL.to_string(),
            token,
        })
    }

    /// Point at another API root (GitHub Enterprise, tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl StatusTracker for GitHubStatusTracker {
    async fn create_deployment(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        environment: &str,
    ) -> Result<i64, DaemonError> {
        let path = format!("/repos/{}/{}/deployments", owner, repo);
        let short = sha.get(..SHORT_SHA_LEN).unwrap_or(sha);
        let body = CreateDeploymentRequest {
            git_ref: sha,
            environment,
            description: format!("Deploying {} via dockyard", short),
            auto_merge: false,
            required_contexts: [],
        };
        let created: CreatedDeployment = self
            .client
            .post_json_for(
                &path,
                &format!("{}{}", self.base_url, path),
                Some(self.token.expose_secret()),
                &body,
            )
            .await?;
        Ok(created.id)
    }

    async fn update_deployment_status(
        &self,
        owner: &str,
        repo: &str,
        external_id: i64,
        state: TrackerState,
        url: Option<&str>,
        description: &str,
    ) -> Result<(), DaemonError> {
        let path = format!("/repos/{}/{}/deployments/{}/statuses", owner, repo, external_id);
        let body = DeploymentStatusRequest {
            state: state.as_str(),
            description,
            environment_url: url,
            log_url: url.map(|u| format!("{}/logs", u)),
        };
        self.client
            .post_json(
                &path,
                &format!("{}{}", self.base_url, path),
                Some(self.token.expose_secret()),
                &body,
            )
            .await
    }

    async fn add_pr_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<(), DaemonError> {
        let path = format!("/repos/{}/{}/issues/{}/comments", owner, repo, pr_number);
        self.client
            .post_json(
                &path,
                &format!("{}{}", self.base_url, path),
                Some(self.token.expose_secret()),
                &CommentRequest { body },
            )
            .await
    }
}
