use std::time::Duration;

use anyhow::{Context, Result, bail};
use secrecy::{ExposeSecret, SecretString};

use nutrilog_core::estimate::{EstimateRequest, EstimateResponse, EstimatedItem};
use nutrilog_core::service::CalorieEstimator;

use crate::config::EstimatorConfig;

/// HTTP client for the remote calorie estimation service.
///
/// The upstream receives `{"description": "..."}` and answers with a list of
/// items, bare or wrapped in `{"items": [...]}`.
pub struct EstimatorClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
    rt: tokio::runtime::Handle,
}

impl EstimatorClient {
    pub fn new(url: &str, api_key: Option<SecretString>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "nutrilog-cli/{} (calorie tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            api_key,
            rt: tokio::runtime::Handle::current(),
        })
    }

    pub fn from_config(config: &EstimatorConfig) -> Result<Self> {
        Self::new(
            config.require_url()?,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub async fn estimate_async(&self, description: &str) -> Result<Vec<EstimatedItem>> {
        let mut request = self.client.post(&self.url).json(&EstimateRequest {
            description: description.to_string(),
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let resp = request
            .send()
            .await
            .context("Failed to reach the estimation service")?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, "estimation service returned an error");
            bail!("Estimation service returned {status}");
        }

        let data: EstimateResponse = resp
            .json()
            .await
            .context("Failed to parse estimation response")?;
        let items = data.into_items();
        tracing::debug!(items = items.len(), "estimation finished");
        Ok(items)
    }
}

impl CalorieEstimator for EstimatorClient {
    fn estimate(&self, description: &str) -> Result<Vec<EstimatedItem>> {
        self.rt.block_on(self.estimate_async(description))
    }
}
