//! Dead-man's-switch style healthcheck pings.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HealthcheckClient {
    client: reqwest::Client,
    url: String,
}

impl HealthcheckClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building healthcheck HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn ping(&self) -> Result<()> {
        self.client.get(&self.url).send().await?.error_for_status()?;
        debug!("Healthcheck ping sent");
        Ok(())
    }

    /// Ping, logging instead of returning failures.
    pub async fn ping_logged(&self) {
        if let Err(e) = self.ping().await {
            warn!(error = %e, "Healthcheck ping failed");
        }
    }
}
