use anyhow::{Result, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::cli::config::MetricsSettings;

/// Raw HTTP outcome of one metrics request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

impl ApiReply {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Third-party URL metrics endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsApi: Send + Sync {
    /// One request carrying exactly `targets`. Only transport failures are errors;
    /// any HTTP status comes back as a reply.
    async fn url_metrics(&self, targets: &[String]) -> Result<ApiReply>;
}

#[derive(Debug, Serialize)]
struct UrlMetricsRequest<'a> {
    targets: &'a [String],
}

/// Moz Links API client
pub struct MozClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl MozClient {
    pub fn new(settings: &MetricsSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl MetricsApi for MozClient {
    async fn url_metrics(&self, targets: &[String]) -> Result<ApiReply> {
        debug!("Requesting URL metrics for {} targets", targets.len());

        let response = self.client.post(&self.endpoint)
            .header("x-moz-token", &self.api_key)
            .json(&UrlMetricsRequest { targets })
            .send()
            .await
            .context("Failed to send request to metrics API")?;

        let status = response.status().as_u16();
        let body = response.text().await
            .context("Failed to read metrics API response")?;

        Ok(ApiReply { status, body })
    }
}
