//! Discord and n8n deployment notifications

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::errors::DaemonError;
use crate::http::client::HttpClient;
use crate::integrations::{Notice, Notifier};
use crate::models::deployment::SHORT_SHA_LEN;

/// Longest log snippet included in a failure notification
pub const MAX_SNIPPET_CHARS: usize = 500;

const COLOR_SUCCESS: u32 = 0x28a745;
const COLOR_FAILURE: u32 = 0xdc3545;
const FOOTER: &str = "dockyard deployment daemon";

#[derive(Debug, Serialize)]
struct DiscordWebhook {
    username: &'static str,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<DiscordField>,
    timestamp: String,
    footer: DiscordFooter,
}

#[derive(Debug, Serialize)]
struct DiscordField {
    name: &'static str,
    value: String,
    inline: bool,
}

impl DiscordField {
    fn new(name: &'static str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name,
            value: value.into(),
            inline,
        }
    }
}

#[derive(Debug, Serialize)]
struct DiscordFooter {
    text: &'static str,
}

/// [`Notifier`] posting to a Discord webhook and/or an n8n webhook
pub struct WebhookNotifier {
    client: HttpClient,
    discord_url: Option<String>,
    n8n_url: Option<String>,
}

impl WebhookNotifier {
    /// `None` when neither webhook is configured
    pub fn from_urls(
        discord_url: Option<String>,
        n8n_url: Option<String>,
    ) -> Result<Option<Self>, DaemonError> {
        if discord_url.is_none() && n8n_url.is_none() {
            return Ok(None);
        }
        Ok(Some(Self {
            client: HttpClient::new()?,
            discord_url,
            n8n_url,
        }))
    }

    async fn send(&self, embed: DiscordEmbed, payload: serde_json::Value) -> Result<(), DaemonError> {
        if let Some(url) = &self.discord_url {
            let webhook = DiscordWebhook {
                username: "dockyard",
                embeds: vec![embed],
            };
            self.client
                .post_json("discord webhook", url, None, &webhook)
                .await?;
        }

        if let Some(url) = &self.n8n_url {
            self.client
                .post_json("n8n webhook", url, None, &payload)
                .await?;
        }

        Ok(())
    }
}

fn short(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}

/// Cap a log snippet at [`MAX_SNIPPET_CHARS`] characters
pub fn truncate_snippet(snippet: &str) -> String {
    match snippet.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &snippet[..cut]),
        None => snippet.to_string(),
    }
}

fn common_fields(notice: &Notice) -> Vec<DiscordField> {
    vec![
        DiscordField::new("Project", notice.project.as_str(), true),
        DiscordField::new("Environment", notice.environment.as_str(), true),
        DiscordField::new("Branch", notice.git_ref.as_str(), true),
        DiscordField::new("Commit", format!("`{}`", short(&notice.sha)), true),
    ]
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_deployment_success(&self, notice: &Notice, url: &str) -> Result<(), DaemonError> {
        let mut fields = common_fields(notice);
        fields.push(DiscordField::new(
            "Duration",
            format!("{:.1}s", notice.duration_secs),
            true,
        ));
        fields.push(DiscordField::new("URL", format!("[View Deployment]({})", url), false));

        let embed = DiscordEmbed {
            title: "Deployment Successful".to_string(),
            description: format!(
                "**{}** deployed to **{}**",
                notice.project, notice.environment
            ),
            color: COLOR_SUCCESS,
            fields,
            timestamp: Utc::now().to_rfc3339(),
            footer: DiscordFooter { text: FOOTER },
        };

        let payload = json!({
            "event": "deployment_success",
            "project": notice.project,
            "environment": notice.environment,
            "ref": notice.git_ref,
            "sha": notice.sha,
            "url": url,
            "duration": notice.duration_secs,
            "timestamp": Utc::now().timestamp(),
        });

        self.send(embed, payload).await
    }

    async fn send_deployment_failure(
        &self,
        notice: &Notice,
        error: &str,
        log_snippet: &str,
    ) -> Result<(), DaemonError> {
        let mut fields = common_fields(notice);
        fields.push(DiscordField::new("Error", error, false));
        if notice.duration_secs > 0.0 {
            fields.push(DiscordField::new(
                "Duration",
                format!("{:.1}s", notice.duration_secs),
                true,
            ));
        }
        if !log_snippet.is_empty() {
            fields.push(DiscordField::new(
                "Logs",
                format!("```\n{}\n```", truncate_snippet(log_snippet)),
                false,
            ));
        }

        let embed = DiscordEmbed {
            title: "Deployment Failed".to_string(),
            description: format!(
                "**{}** failed to deploy to **{}**",
                notice.project, notice.environment
            ),
            color: COLOR_FAILURE,
            fields,
            timestamp: Utc::now().to_rfc3339(),
            footer: DiscordFooter { text: FOOTER },
        };

        let payload = json!({
            "event": "deployment_failure",
            "project": notice.project,
            "environment": notice.environment,
            "ref": notice.git_ref,
            "sha": notice.sha,
            "error": error,
            "duration": notice.duration_secs,
            "timestamp": Utc::now().timestamp(),
        });

        self.send(embed, payload).await
    }
}
