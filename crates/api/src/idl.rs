//! Program interface descriptor (Anchor IDL) access.
//!
//! The program address is read from the descriptor: `address` in current
//! IDLs, `metadata.address` in legacy ones. A copy of the descriptor is
//! bundled with the binary; a remote one can be polled to notice redeploys.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const BUNDLED_IDL: &str = include_str!("../idl/perpetuals.json");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdlDescriptor {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub metadata: Option<IdlMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdlMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl IdlDescriptor {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid IDL descriptor")
    }

    /// Descriptor shipped with the binary.
    pub fn bundled() -> Result<Self> {
        Self::parse(BUNDLED_IDL)
    }

    /// Program address, preferring the legacy `metadata.address` field the
    /// way the deployment pipeline publishes it.
    pub fn program_address(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.address.as_deref())
            .or(self.address.as_deref())
    }
}

/// Fetches the published descriptor over HTTP.
#[derive(Debug, Clone)]
pub struct IdlClient {
    client: reqwest::Client,
    url: String,
}

impl IdlClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building IDL HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch(&self) -> Result<IdlDescriptor> {
        let descriptor = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<IdlDescriptor>()
            .await
            .context("invalid IDL descriptor")?;
        debug!(address = ?descriptor.program_address(), "Fetched IDL descriptor");
        Ok(descriptor)
    }

    /// Published program address, or `None` if the descriptor is
    /// unreachable or carries no address.
    pub async fn fetch_program_address(&self) -> Option<String> {
        match self.fetch().await {
            Ok(descriptor) => descriptor.program_address().map(str::to_string),
            Err(e) => {
                debug!(error = %e, "Failed to fetch IDL descriptor");
                None
            }
        }
    }
}
