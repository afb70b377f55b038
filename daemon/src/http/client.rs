//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::DaemonError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound JSON client shared by the status tracker and the notifier
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, DaemonError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("dockyard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// POST `body` as JSON to `url`.
    ///
    /// `target` names the endpoint in logs, since webhook URLs carry secrets.
    pub async fn post_json<B: Serialize>(
        &self,
        target: &str,
        url: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<(), DaemonError> {
        self.send(target, url, bearer, body).await?;
        Ok(())
    }

    /// POST `body` as JSON to `url` and decode the JSON reply
    pub async fn post_json_for<B: Serialize, T: DeserializeOwned>(
        &self,
        target: &str,
        url: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, DaemonError> {
        let response = self.send(target, url, bearer, body).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send<B: Serialize>(
        &self,
        target: &str,
        url: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<Response, DaemonError> {
        debug!("POST {}", target);

        let mut request = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/vnd.github+json, application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("HTTP POST {} failed: {} - {}", target, status, body);
            return Err(DaemonError::HttpStatus(status.as_u16(), body));
        }

        Ok(response)
    }
}
