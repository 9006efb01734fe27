//! Shared test helpers for `polaris-core` integration tests.
//!
//! Account fixtures, scripted ports and a client builder so scenario tests
//! can focus on routing behaviour instead of wiring.

#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;

use polaris_core::RoutingClient;
use polaris_domain::{
    AccountLocation, AccountProperties, ClientConfig, ConsistencyLevel, ConsistencyPolicy, Endpoint,
};
use url::Url;

pub use mocks::{RecordedCall, ScriptedExecutor, ScriptedReader, Step, TogglingProber};

pub fn url(region: &str) -> Url {
    Url::parse(&format!("https://{}.example.com/", region.to_lowercase())).unwrap()
}

pub fn endpoint(region: &str) -> Endpoint {
    Endpoint::new(region, url(region))
}

fn location(name: &str) -> AccountLocation {
    AccountLocation { name: name.to_string(), database_account_endpoint: url(name).to_string() }
}

/// Account document with the given writable and readable regions
pub fn account(
    writable: &[&str],
    readable: &[&str],
    multi_write: bool,
    consistency: ConsistencyLevel,
) -> AccountProperties {
    AccountProperties {
        id: Some("contoso".to_string()),
        writable_locations: writable.iter().map(|n| location(n)).collect(),
        readable_locations: readable.iter().map(|n| location(n)).collect(),
        enable_multiple_write_locations: multi_write,
        user_consistency_policy: ConsistencyPolicy { default_consistency_level: consistency },
    }
}

/// East writes; East and West read; Session consistency
pub fn single_write_account() -> AccountProperties {
    account(&["East"], &["East", "West"], false, ConsistencyLevel::Session)
}

/// Same regions with West as the write region
pub fn failed_over_account() -> AccountProperties {
    account(&["West"], &["West", "East"], false, ConsistencyLevel::Session)
}

/// East and North both write; all three regions read
pub fn multi_write_account() -> AccountProperties {
    account(&["East", "North"], &["East", "North", "West"], true, ConsistencyLevel::Session)
}

/// Defaults with background probing off so health only moves on traffic
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("https://account.example.com/");
    config.health.background_probing = false;
    config
}

pub async fn build_client(
    config: ClientConfig,
    executor: Arc<ScriptedExecutor>,
    reader: Arc<ScriptedReader>,
) -> RoutingClient {
    init_tracing();
    RoutingClient::builder(config)
        .executor(executor)
        .metadata_reader(reader)
        .prober(TogglingProber::new(true))
        .build()
        .await
        .expect("client should build")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("polaris_core=debug")
        .try_init();
}
