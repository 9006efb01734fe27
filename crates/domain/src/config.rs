//! Client configuration
//!
//! Every field has a default, so a config file only needs the values it
//! overrides. Durations are stored as integer seconds or milliseconds and
//! exposed through `Duration` accessors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{PolarisError, Result};
use crate::types::ConsistencyLevel;

/// Routing client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Account metadata endpoint (global endpoint)
    pub account_endpoint: String,
    /// Client-level preferred regions, used when a request gives none
    pub preferred_regions: Vec<String>,
    /// Client-level excluded regions, used when a request gives none
    pub excluded_regions: Vec<String>,
    pub topology: TopologyConfig,
    pub health: HealthConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub consistency: ConsistencyConfig,
}

/// Topology refresh configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub refresh_interval_secs: u64,
    pub initial_refresh_attempts: u32,
    pub initial_refresh_backoff_ms: u64,
    /// Consecutive write connection/timeout failures that trigger a
    /// background refresh
    pub write_failures_before_refresh: u32,
    pub metadata_request_timeout_ms: u64,
}

/// Endpoint health tracking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures before Healthy becomes Suspect
    pub suspect_after_failures: u32,
    /// Further failures within the suspect window before Unhealthy
    pub unhealthy_after_failures: u32,
    pub suspect_window_secs: u64,
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub background_probing: bool,
}

/// Partition circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub consecutive_failure_threshold: u32,
    pub failure_rate_threshold: f64,
    pub minimum_requests: u32,
    pub window_secs: u64,
    pub cooldown_secs: u64,
}

/// Retry orchestration configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub operation_timeout_ms: u64,
    pub max_connection_retries: u32,
    pub write_timeout_retries: u32,
    pub write_backoff_base_ms: u64,
    pub write_backoff_max_ms: u64,
    pub default_throttle_delay_ms: u64,
    pub session_retries: u32,
    pub session_retry_delay_ms: u64,
    pub stale_routing_retries: u32,
}

/// Consistency-related routing policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Overrides the account default when set
    pub default_override: Option<ConsistencyLevel>,
    /// Whether Strong/BoundedStaleness reads without preferred regions may
    /// be served by, and retried in, secondary regions
    pub cross_region_reads_for_strong: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            account_endpoint: String::new(),
            preferred_regions: Vec::new(),
            excluded_regions: Vec::new(),
            topology: TopologyConfig::default(),
            health: HealthConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            consistency: ConsistencyConfig::default(),
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            initial_refresh_attempts: DEFAULT_INITIAL_REFRESH_ATTEMPTS,
            initial_refresh_backoff_ms: DEFAULT_INITIAL_REFRESH_BACKOFF_MS,
            write_failures_before_refresh: DEFAULT_WRITE_FAILURES_BEFORE_REFRESH,
            metadata_request_timeout_ms: DEFAULT_METADATA_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            suspect_after_failures: DEFAULT_SUSPECT_AFTER_FAILURES,
            unhealthy_after_failures: DEFAULT_UNHEALTHY_AFTER_FAILURES,
            suspect_window_secs: DEFAULT_SUSPECT_WINDOW_SECS,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            background_probing: true,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            consecutive_failure_threshold: DEFAULT_CONSECUTIVE_FAILURE_THRESHOLD,
            failure_rate_threshold: DEFAULT_FAILURE_RATE_THRESHOLD,
            minimum_requests: DEFAULT_MINIMUM_REQUESTS,
            window_secs: DEFAULT_BREAKER_WINDOW_SECS,
            cooldown_secs: DEFAULT_BREAKER_COOLDOWN_SECS,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            max_connection_retries: DEFAULT_MAX_CONNECTION_RETRIES,
            write_timeout_retries: DEFAULT_WRITE_TIMEOUT_RETRIES,
            write_backoff_base_ms: DEFAULT_WRITE_BACKOFF_BASE_MS,
            write_backoff_max_ms: DEFAULT_WRITE_BACKOFF_MAX_MS,
            default_throttle_delay_ms: DEFAULT_THROTTLE_DELAY_MS,
            session_retries: DEFAULT_SESSION_RETRIES,
            session_retry_delay_ms: DEFAULT_SESSION_RETRY_DELAY_MS,
            stale_routing_retries: DEFAULT_STALE_ROUTING_RETRIES,
        }
    }
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self { default_override: None, cross_region_reads_for_strong: true }
    }
}

impl ClientConfig {
    pub fn new(account_endpoint: impl Into<String>) -> Self {
        Self { account_endpoint: account_endpoint.into(), ..Self::default() }
    }

    /// Reject configurations the routing core cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`PolarisError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.account_endpoint.trim().is_empty() {
            return Err(invalid("account_endpoint", "must not be empty"));
        }
        url::Url::parse(&self.account_endpoint)
            .map_err(|e| invalid("account_endpoint", &e.to_string()))?;

        let zero_checks = [
            ("topology.refresh_interval_secs", self.topology.refresh_interval_secs == 0),
            ("topology.initial_refresh_attempts", self.topology.initial_refresh_attempts == 0),
            ("health.suspect_after_failures", self.health.suspect_after_failures == 0),
            ("health.unhealthy_after_failures", self.health.unhealthy_after_failures == 0),
            ("health.probe_interval_secs", self.health.probe_interval_secs == 0),
            ("health.probe_timeout_ms", self.health.probe_timeout_ms == 0),
            (
                "circuit_breaker.consecutive_failure_threshold",
                self.circuit_breaker.consecutive_failure_threshold == 0,
            ),
            ("circuit_breaker.minimum_requests", self.circuit_breaker.minimum_requests == 0),
            ("circuit_breaker.cooldown_secs", self.circuit_breaker.cooldown_secs == 0),
            ("retry.operation_timeout_ms", self.retry.operation_timeout_ms == 0),
        ];
        if let Some((field, _)) = zero_checks.iter().find(|(_, is_zero)| *is_zero) {
            return Err(invalid(field, "must be greater than zero"));
        }

        let rate = self.circuit_breaker.failure_rate_threshold;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(invalid("circuit_breaker.failure_rate_threshold", "must be in (0, 1]"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> PolarisError {
    PolarisError::Config(format!("{field} {message}"))
}

impl TopologyConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn initial_refresh_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_refresh_backoff_ms)
    }

    pub fn metadata_request_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_request_timeout_ms)
    }
}

impl HealthConfig {
    pub fn suspect_window(&self) -> Duration {
        Duration::from_secs(self.suspect_window_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl RetryConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn write_backoff_base(&self) -> Duration {
        Duration::from_millis(self.write_backoff_base_ms)
    }

    pub fn write_backoff_max(&self) -> Duration {
        Duration::from_millis(self.write_backoff_max_ms)
    }

    pub fn default_throttle_delay(&self) -> Duration {
        Duration::from_millis(self.default_throttle_delay_ms)
    }

    pub fn session_retry_delay(&self) -> Duration {
        Duration::from_millis(self.session_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("https://contoso.example.com/");
        assert!(config.validate().is_ok());
        assert_eq!(config.topology.refresh_interval(), Duration::from_secs(300));
        assert_eq!(config.health.suspect_after_failures, 3);
        assert_eq!(config.health.unhealthy_after_failures, 2);
        assert_eq!(config.circuit_breaker.cooldown(), Duration::from_secs(30));
        assert_eq!(config.retry.operation_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry.write_timeout_retries, 2);
        assert!(config.consistency.cross_region_reads_for_strong);
    }

    /// Validates `validate()` rejects each class of invalid value.
    #[test]
    fn test_validate_rejects_invalid_values() {
        assert!(ClientConfig::default().validate().is_err());
        assert!(ClientConfig::new("not a url").validate().is_err());

        let mut config = ClientConfig::new("https://contoso.example.com/");
        config.health.suspect_after_failures = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("health.suspect_after_failures"));

        let mut config = ClientConfig::new("https://contoso.example.com/");
        config.circuit_breaker.failure_rate_threshold = 1.5;
        assert!(config.validate().is_err());

        config.circuit_breaker.failure_rate_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    /// Validates partial TOML-shaped JSON keeps defaults for omitted fields.
    #[test]
    fn test_partial_document_uses_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"account_endpoint":"https://a.example.com/","retry":{"session_retries":4}}"#,
        )
        .unwrap();
        assert_eq!(config.retry.session_retries, 4);
        assert_eq!(config.retry.max_connection_retries, 3);
        assert!(config.circuit_breaker.enabled);
    }
}
