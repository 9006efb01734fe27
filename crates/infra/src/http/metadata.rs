//! Account metadata over HTTP

use std::time::Duration;

use async_trait::async_trait;
use polaris_core::AccountMetadataReader;
use polaris_domain::{AccountProperties, ClientConfig, PolarisError, TopologyError};
use reqwest::Method;
use tracing::{debug, instrument};
use url::Url;

use super::client::HttpClient;
use crate::errors::topology_error;

/// Attempts per read; the topology store retries whole refreshes on top
const METADATA_ATTEMPTS: usize = 2;
const METADATA_BACKOFF: Duration = Duration::from_millis(100);

/// Reads the account document with a GET on the account endpoint
#[derive(Debug, Clone)]
pub struct HttpAccountMetadataReader {
    client: HttpClient,
    endpoint: Url,
}

impl HttpAccountMetadataReader {
    /// Reader for `config.account_endpoint` using the configured metadata
    /// request timeout
    ///
    /// # Errors
    ///
    /// Returns [`PolarisError::Config`] when the endpoint is not a URL or the
    /// HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, PolarisError> {
        let endpoint = Url::parse(&config.account_endpoint)
            .map_err(|e| PolarisError::Config(format!("account_endpoint {e}")))?;
        let client = HttpClient::builder()
            .timeout(config.topology.metadata_request_timeout())
            .max_attempts(METADATA_ATTEMPTS)
            .base_backoff(METADATA_BACKOFF)
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: HttpClient, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl AccountMetadataReader for HttpAccountMetadataReader {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn read_account(&self) -> Result<AccountProperties, TopologyError> {
        let timeout = self.client.timeout();
        let response = self
            .client
            .send(self.client.request(Method::GET, self.endpoint.clone()))
            .await
            .map_err(|e| topology_error(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TopologyError::Unavailable(format!(
                "account endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await.map_err(|e| topology_error(&e, timeout))?;
        let document: AccountProperties = serde_json::from_slice(&body)
            .map_err(|e| TopologyError::InvalidDocument(e.to_string()))?;

        debug!(
            writable = document.writable_locations.len(),
            readable = document.readable_locations.len(),
            "read account metadata"
        );
        Ok(document)
    }
}
