//! Adapter interfaces for external systems.
//!
//! The resolver only needs one thing from the outside world: raw bundle
//! bytes for a library name. [`Registry`] is that seam; [`HubClient`] is
//! the HTTP implementation that talks to the content-type Hub.

pub mod hub;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use hub::{HubClient, DEFAULT_HUB_URL, DEFAULT_TIMEOUT_SECS};

/// Why a registry fetch failed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("registry returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("registry request timed out after {0:?}")]
    Timeout(Duration),

    #[error("registry request failed: {0}")]
    Transport(String),
}

/// Source of library bundles that are not available locally
#[async_trait]
pub trait Registry: Send + Sync {
    /// Human-readable registry name
    fn name(&self) -> &str;

    /// Download the bundle for `machine_name` and return its archive bytes
    async fn fetch(&self, machine_name: &str) -> Result<Vec<u8>, FetchError>;
}
