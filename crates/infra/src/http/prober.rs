//! Endpoint liveness over HTTP

use async_trait::async_trait;
use polaris_core::EndpointProber;
use polaris_domain::{Endpoint, HealthConfig, PolarisError};
use reqwest::Method;
use tracing::debug;

use super::classify::classify_transport_error;
use super::client::HttpClient;

/// Probes an endpoint with a single GET
///
/// Any response below 500 counts as alive. Transport errors, timeouts and
/// 5xx responses do not.
#[derive(Debug, Clone)]
pub struct HttpEndpointProber {
    client: HttpClient,
}

impl HttpEndpointProber {
    /// # Errors
    ///
    /// Returns [`PolarisError::Config`] when the HTTP client cannot be built.
    pub fn new(config: &HealthConfig) -> Result<Self, PolarisError> {
        let client = HttpClient::builder().timeout(config.probe_timeout()).max_attempts(1).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EndpointProber for HttpEndpointProber {
    async fn probe(&self, endpoint: &Endpoint) -> bool {
        match self.client.send(self.client.request(Method::GET, endpoint.url.clone())).await {
            Ok(response) => {
                let status = response.status();
                debug!(region = %endpoint.region, url = %endpoint.url, %status, "probe answered");
                status.as_u16() < 500
            }
            Err(err) => {
                debug!(
                    region = %endpoint.region,
                    url = %endpoint.url,
                    failure = classify_transport_error(&err).label(),
                    "probe failed"
                );
                false
            }
        }
    }
}
