//! HTTP client for the content-type Hub.
//!
//! Endpoint: POST {base}/content-types/{machineName}
//! No request body; a 200 response carries the bundle archive.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{FetchError, Registry};

/// Default Hub API base URL
pub const DEFAULT_HUB_URL: &str = "https://api.h5p.org/v1";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Hub registry client
pub struct HubClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HubClient {
    /// Create a client with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    /// Build the download URL for a library
    fn content_type_url(&self, machine_name: &str) -> String {
        format!("{}/content-types/{}", self.base_url, machine_name)
    }

    /// Configured request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Registry for HubClient {
    fn name(&self) -> &str {
        "hub"
    }

    #[instrument(skip(self), fields(url = %self.content_type_url(machine_name)))]
    async fn fetch(&self, machine_name: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .post(self.content_type_url(machine_name))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        debug!(bytes = bytes.len(), "Downloaded bundle");
        Ok(bytes.to_vec())
    }
}
