//! Beacon API Client Adapter
//!
//! Implements `FinalityUpdateSource` over HTTP against the standard beacon
//! light-client endpoint.

use crate::domain::{RestakingSyncError, SyncResult};
use crate::ports::outbound::{EndpointProvider, FinalityUpdate, FinalityUpdateSource};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Beacon light-client finality update path.
pub const FINALITY_UPDATE_PATH: &str = "/eth/v1/beacon/light_client/finality_update";

/// HTTP beacon client.
pub struct BeaconApiClient {
    client: Client,
    endpoints: Arc<dyn EndpointProvider>,
}

impl BeaconApiClient {
    /// Create a client drawing URLs from `endpoints`.
    pub fn new(endpoints: Arc<dyn EndpointProvider>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    async fn fetch(&self, base: &str) -> SyncResult<FinalityUpdate> {
        let url = finality_update_url(base);
        debug!("[qc-18] GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RestakingSyncError::HttpStatus {
                endpoint: base.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Full finality update URL for a beacon base URL.
pub fn finality_update_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), FINALITY_UPDATE_PATH)
}

#[async_trait]
impl FinalityUpdateSource for BeaconApiClient {
    async fn finality_update(&self) -> SyncResult<FinalityUpdate> {
        let endpoint = self.endpoints.select()?;
        match self.fetch(&endpoint).await {
            Ok(update) => {
                self.endpoints.record_success(&endpoint);
                Ok(update)
            }
            Err(e) => {
                self.endpoints.record_failure(&endpoint);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::StaticEndpointProvider;

    #[test]
    fn test_finality_update_url() {
        assert_eq!(
            finality_update_url("http://beacon:5052/"),
            "http://beacon:5052/eth/v1/beacon/light_client/finality_update"
        );
        assert_eq!(
            finality_update_url("http://beacon:5052"),
            "http://beacon:5052/eth/v1/beacon/light_client/finality_update"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // port 9 (discard) is not listening on loopback in test environments
        let endpoints = Arc::new(StaticEndpointProvider::new("http://127.0.0.1:9"));
        let client = BeaconApiClient::new(endpoints, Duration::from_millis(200)).unwrap();
        let err = client.finality_update().await.unwrap_err();
        assert!(matches!(err, RestakingSyncError::Transport(_)));
    }
}
