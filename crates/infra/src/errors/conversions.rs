//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use polaris_domain::{PolarisError, TopologyError};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub PolarisError);

impl From<InfraError> for PolarisError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<PolarisError> for InfraError {
    fn from(value: PolarisError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → PolarisError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return InfraError(PolarisError::Config(format!("invalid HTTP client setup: {value}")));
        }
        InfraError(PolarisError::Topology(topology_error(&value, Duration::ZERO)))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TopologyError */
/* -------------------------------------------------------------------------- */

/// Map a metadata request failure to a topology error
///
/// `timeout` is the request timeout that was in force; it is reported in
/// [`TopologyError::Timeout`].
pub fn topology_error(err: &HttpError, timeout: Duration) -> TopologyError {
    if err.is_timeout() {
        return TopologyError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
    }

    #[cfg(not(target_arch = "wasm32"))]
    if err.is_connect() {
        return TopologyError::Unavailable(format!("connection failure: {err}"));
    }

    if err.is_decode() {
        return TopologyError::InvalidDocument(err.to_string());
    }

    if let Some(status) = err.status() {
        return TopologyError::Unavailable(format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status")
        ));
    }

    TopologyError::Unavailable(err.to_string())
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::{Client, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn http_status_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::SERVICE_UNAVAILABLE))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        match topology_error(&error, Duration::from_secs(1)) {
            TopologyError::Unavailable(msg) => assert!(msg.contains("503")),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_refused_maps_to_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped = topology_error(&error, Duration::from_secs(1));
        assert!(mapped.is_transient());
        assert!(matches!(mapped, TopologyError::Unavailable(_)));
    }

    #[tokio::test]
    async fn timeout_reports_configured_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client =
            Client::builder().no_proxy().timeout(Duration::from_millis(50)).build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap_err();

        assert_eq!(topology_error(&error, Duration::from_millis(50)), TopologyError::Timeout(50));
    }

    #[test]
    fn infra_error_round_trips_domain_error() {
        let err: PolarisError = InfraError::from(PolarisError::Internal("boom".into())).into();
        assert_eq!(err, PolarisError::Internal("boom".into()));
    }
}
