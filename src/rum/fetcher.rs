//! Remote configuration retrieval

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::catalog::Configuration;
use super::error::RumError;
use super::transport::{Transport, TransportError, TransportRequest};

/// Fetches the endpoint catalog once per run
pub struct ConfigurationFetcher {
    transport: Arc<dyn Transport>,
    config_url: String,
}

impl ConfigurationFetcher {
    pub fn new(transport: Arc<dyn Transport>, config_url: impl Into<String>) -> Self {
        Self {
            transport,
            config_url: config_url.into(),
        }
    }

    /// Single attempt; any failure aborts the run
    pub async fn fetch(&self, cancel: &CancellationToken) -> Result<Configuration, RumError> {
        let body = self
            .transport
            .send(TransportRequest::get(self.config_url.as_str()), cancel)
            .await
            .map_err(|e| match e {
                TransportError::Canceled => RumError::Canceled,
                other => RumError::config(format!(
                    "fetching {} failed: {}",
                    self.config_url, other
                )),
            })?;

        let config = Configuration::from_json(&body)?;
        debug!(
            endpoints = config.endpoints.len(),
            sample_count = config.sample_count,
            report_endpoints = config.report_endpoint_ids.len(),
            "fetched endpoint catalog"
        );

        Ok(config)
    }
}
