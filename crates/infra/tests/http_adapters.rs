//! Integration tests for the HTTP metadata reader and endpoint prober

use std::time::Duration;

use polaris_core::{AccountMetadataReader, EndpointProber};
use polaris_domain::{ClientConfig, Endpoint, HealthConfig, TopologyError};
use polaris_infra::{HttpAccountMetadataReader, HttpEndpointProber};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn account_document(east: &str, west: &str) -> serde_json::Value {
    json!({
        "id": "contoso",
        "writableLocations": [
            { "name": "East US", "databaseAccountEndpoint": east }
        ],
        "readableLocations": [
            { "name": "East US", "databaseAccountEndpoint": east },
            { "name": "West US", "databaseAccountEndpoint": west }
        ],
        "enableMultipleWriteLocations": false,
        "userConsistencyPolicy": { "defaultConsistencyLevel": "Session" }
    })
}

fn reader_for(server: &MockServer, timeout_ms: u64) -> HttpAccountMetadataReader {
    let mut config = ClientConfig::new(format!("{}/", server.uri()));
    config.topology.metadata_request_timeout_ms = timeout_ms;
    HttpAccountMetadataReader::new(&config).expect("reader should build")
}

#[tokio::test]
async fn test_reader_parses_account_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_document(
            "https://contoso-eastus.example.com/",
            "https://contoso-westus.example.com/",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let document = reader_for(&server, 1_000).read_account().await.expect("document");
    assert_eq!(document.id.as_deref(), Some("contoso"));
    assert_eq!(document.writable_locations.len(), 1);
    assert_eq!(document.readable_locations[1].name, "West US");

    let snapshot = document.to_snapshot().expect("valid topology");
    assert_eq!(snapshot.primary_write_region().name, "East US");
    assert_eq!(snapshot.regions().len(), 2);
}

#[tokio::test]
async fn test_reader_retries_server_error_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_document(
            "https://contoso-eastus.example.com/",
            "https://contoso-westus.example.com/",
        )))
        .mount(&server)
        .await;

    let document = reader_for(&server, 1_000).read_account().await.expect("document");
    assert_eq!(document.readable_locations.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_reader_reports_unavailable_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

    let err = reader_for(&server, 1_000).read_account().await.unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, TopologyError::Unavailable(ref m) if m.contains("503")));
}

#[tokio::test]
async fn test_reader_reports_invalid_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = reader_for(&server, 1_000).read_account().await.unwrap_err();
    assert!(matches!(err, TopologyError::InvalidDocument(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_reader_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let err = reader_for(&server, 50).read_account().await.unwrap_err();
    assert_eq!(err, TopologyError::Timeout(50));
}

#[test]
fn test_reader_rejects_bad_endpoint() {
    let config = ClientConfig::new("not a url");
    assert!(HttpAccountMetadataReader::new(&config).is_err());
}

fn prober(timeout_ms: u64) -> HttpEndpointProber {
    let config = HealthConfig { probe_timeout_ms: timeout_ms, ..HealthConfig::default() };
    HttpEndpointProber::new(&config).expect("prober should build")
}

fn endpoint_for(server: &MockServer) -> Endpoint {
    Endpoint::new("East US", Url::parse(&server.uri()).unwrap())
}

/// Validates the prober's liveness rule.
///
/// Assertions:
/// - Confirms a 4xx answer counts as alive.
/// - Confirms a 5xx answer does not.
#[tokio::test]
async fn test_prober_status_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let prober = prober(1_000);
    assert!(prober.probe(&endpoint_for(&server)).await);
    assert!(!prober.probe(&endpoint_for(&server)).await);
}

#[tokio::test]
async fn test_prober_timeout_is_not_alive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    assert!(!prober(50).probe(&endpoint_for(&server)).await);
}

#[tokio::test]
async fn test_prober_connection_refused_is_not_alive() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = Endpoint::new("East US", Url::parse(&format!("http://{addr}/")).unwrap());
    assert!(!prober(1_000).probe(&endpoint).await);
}
