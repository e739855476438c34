//! HTTP relay for completed scans
//!
//! Ships each scan event as JSON to a REST endpoint. Failures are
//! returned to the watch loop, which logs them; there is no retry or
//! buffering here, the receiving service owns delivery robustness.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;

use crate::config::RelayConfig;
use crate::event::{ScanEvent, ScanHandler};

/// POSTs scan events to a fixed endpoint
pub struct HttpRelay {
    client: Client,
    endpoint: String,
}

impl HttpRelay {
    /// Build a relay from config; requires `relay.endpoint` to be set
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .context("relay.endpoint is not configured")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Cannot build HTTP client")?;

        info!("Relaying scan events to {}", endpoint);
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ScanHandler for HttpRelay {
    async fn handle(&self, event: ScanEvent) -> Result<()> {
        debug!("Relaying scan from {}: {:?}", event.name, event.string);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&event)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?;
        response
            .error_for_status()
            .with_context(|| format!("Endpoint {} rejected scan event", self.endpoint))?;

        debug!("Scan event relayed to {}", self.endpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_endpoint() {
        let config = RelayConfig::default();
        assert!(HttpRelay::new(&config).is_err());
    }

    #[test]
    fn test_new_with_endpoint() {
        let config = RelayConfig {
            endpoint: Some("http://127.0.0.1:5000/workbench/hid-event".to_string()),
            ..Default::default()
        };
        let relay = HttpRelay::new(&config).unwrap();
        assert_eq!(relay.endpoint, "http://127.0.0.1:5000/workbench/hid-event");
    }
}
