//! Deployment models

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::{self, DeploymentEvent, DeploymentStatus};
use crate::errors::DaemonError;

/// Length of the commit sha prefix used in identifiers and messages
pub const SHORT_SHA_LEN: usize = 7;

/// Room left for a branch name behind `preview-` in a 63-character DNS label
const MAX_BRANCH_LABEL_LEN: usize = 63 - "preview-".len();

/// One attempt to build and run a commit for an owner/repo/environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Assigned on enqueue, empty before
    pub id: String,

    pub owner: String,
    pub repo: String,

    #[serde(rename = "ref")]
    pub git_ref: String,

    pub sha: String,
    pub clone_url: String,
    pub environment: String,

    #[serde(default)]
    pub pr_number: Option<u64>,

    /// External deployment tracking id (GitHub deployment id)
    #[serde(default)]
    pub external_id: Option<i64>,

    status: DeploymentStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub log_path: Option<PathBuf>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub project_type: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

impl Deployment {
    /// Create a queued deployment for a push to `git_ref`.
    ///
    /// The environment is derived from the ref and the clone URL defaults to
    /// the GitHub HTTPS URL; both can be overridden with the `with_*` methods.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        git_ref: impl Into<String>,
        sha: impl Into<String>,
    ) -> Self {
        let owner = owner.into();
        let repo = repo.into();
        let git_ref = git_ref.into();
        Self {
            id: String::new(),
            clone_url: format!("https://github.com/{}/{}.git", owner, repo),
            environment: environment_for_ref(&git_ref),
            owner,
            repo,
            git_ref,
            sha: sha.into(),
            pr_number: None,
            external_id: None,
            status: DeploymentStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            log_path: None,
            port: None,
            project_type: None,
            url: None,
            error: None,
        }
    }

    pub fn with_clone_url(mut self, clone_url: impl Into<String>) -> Self {
        self.clone_url = clone_url.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Mark as a pull-request preview; also switches to the PR's preview environment
    pub fn with_pull_request(mut self, pr_number: u64) -> Self {
        self.pr_number = Some(pr_number);
        self.environment = environment_for_pull_request(pr_number);
        self
    }

    pub fn with_external_id(mut self, external_id: i64) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// `owner/repo`
    pub fn project(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn short_sha(&self) -> &str {
        self.sha.get(..SHORT_SHA_LEN).unwrap_or(&self.sha)
    }

    /// Seconds between start and completion, zero until both are known
    pub fn duration_secs(&self) -> f64 {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }

    /// Identifier for an enqueue at `at`: `{owner}-{repo}-{short sha}-{unix seconds}`
    pub fn generate_id(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}-{}",
            self.owner,
            self.repo,
            self.short_sha(),
            at.timestamp()
        )
    }

    /// Apply a lifecycle event, keeping the timestamps in step with the status
    pub fn apply(&mut self, event: DeploymentEvent) -> Result<(), DaemonError> {
        let next = fsm::transition(self.status, &event)?;
        let now = Utc::now();

        match event {
            DeploymentEvent::Claim => {
                self.started_at = Some(now);
            }
            DeploymentEvent::Succeed => {
                self.completed_at = Some(now);
            }
            DeploymentEvent::Fail(error) => {
                self.error = Some(error);
                self.completed_at = Some(now);
            }
        }

        self.status = next;
        Ok(())
    }
}

/// Map a pushed ref onto its environment name
pub fn environment_for_ref(git_ref: &str) -> String {
    if git_ref.ends_with("/main") || git_ref.ends_with("/master") {
        return "production".to_string();
    }
    if git_ref.contains("/staging") {
        return "staging".to_string();
    }
    if git_ref.contains("/develop") {
        return "development".to_string();
    }

    let parts: Vec<&str> = git_ref.split('/').collect();
    match parts.last().map(|branch| dns_label(branch)) {
        Some(branch) if parts.len() > 2 && !branch.is_empty() => format!("preview-{}", branch),
        _ => "preview".to_string(),
    }
}

/// Lowercase `raw`, fold everything else to single dashes, and fit what is
/// left behind the `preview-` prefix of a DNS label
fn dns_label(raw: &str) -> String {
    let mut label = String::new();
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.is_empty() && !label.ends_with('-') {
            label.push('-');
        }
    }
    label.truncate(MAX_BRANCH_LABEL_LEN);
    label.trim_end_matches('-').to_string()
}

/// Environment used for a pull-request preview
pub fn environment_for_pull_request(pr_number: u64) -> String {
    format!("preview-pr-{}", pr_number)
}
