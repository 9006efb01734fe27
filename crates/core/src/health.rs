//! Endpoint health tracking
//!
//! Per-endpoint liveness inferred from user-traffic outcomes and from
//! background probes. Records are created lazily on first contact and kept
//! for the lifetime of the client (bounded by topology size).
//!
//! ```text
//! Healthy --N consecutive failures--> Suspect --M more within W--> Unhealthy
//!    ^                                   |                             |
//!    +---------- traffic success --------+                             |
//!    +----------------------- probe success ---------------------------+
//! ```
//!
//! Only connectivity and 5xx-class failures move an endpoint; application
//! errors never do.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::join_all;
use polaris_common::resilience::{Clock, SystemClock};
use polaris_domain::{ClassifiedError, Endpoint, HealthConfig, HealthState};
use tracing::{debug, info, warn};

use crate::ports::EndpointProber;

/// Health bookkeeping for one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHealthRecord {
    pub endpoint: Endpoint,
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub last_failure_time: Option<Instant>,
    pub last_success_time: Option<Instant>,
    pub total_successes: u64,
    suspect_since: Option<Instant>,
    failures_while_suspect: u32,
}

impl EndpointHealthRecord {
    fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: HealthState::Healthy,
            consecutive_failures: 0,
            last_failure_time: None,
            last_success_time: None,
            total_successes: 0,
            suspect_since: None,
            failures_while_suspect: 0,
        }
    }

    fn mark_healthy(&mut self) {
        self.state = HealthState::Healthy;
        self.consecutive_failures = 0;
        self.suspect_since = None;
        self.failures_while_suspect = 0;
    }
}

/// Tracks endpoint liveness and answers eligibility queries
pub struct HealthTracker {
    records: DashMap<Endpoint, EndpointHealthRecord>,
    prober: Arc<dyn EndpointProber>,
    clock: Arc<dyn Clock>,
    config: HealthConfig,
}

impl std::fmt::Debug for HealthTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthTracker")
            .field("endpoints", &self.records.len())
            .field("config", &self.config)
            .finish()
    }
}

impl HealthTracker {
    pub fn new(config: HealthConfig, prober: Arc<dyn EndpointProber>) -> Self {
        Self::with_clock(config, prober, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: HealthConfig,
        prober: Arc<dyn EndpointProber>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { records: DashMap::new(), prober, clock, config }
    }

    /// Record a successful response from user traffic
    ///
    /// Lifts Suspect back to Healthy. Unhealthy endpoints stay Unhealthy
    /// until a probe succeeds.
    pub fn record_success(&self, endpoint: &Endpoint) {
        let now = self.clock.now();
        let mut record = self.entry(endpoint);
        record.total_successes += 1;
        record.last_success_time = Some(now);

        match record.state {
            HealthState::Healthy => record.consecutive_failures = 0,
            HealthState::Suspect => {
                record.mark_healthy();
                info!(endpoint = %endpoint, "Endpoint recovered from suspect");
            }
            HealthState::Unhealthy => {}
        }
    }

    /// Record a failed attempt; ignored unless the failure affects health
    pub fn record_failure(&self, endpoint: &Endpoint, error: &ClassifiedError) {
        if !error.affects_endpoint_health() {
            return;
        }
        self.register_failure(endpoint, error.label());
    }

    fn register_failure(&self, endpoint: &Endpoint, cause: &'static str) {
        let now = self.clock.now();
        let window = self.config.suspect_window();
        let mut record = self.entry(endpoint);
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_failure_time = Some(now);

        match record.state {
            HealthState::Healthy => {
                if record.consecutive_failures >= self.config.suspect_after_failures {
                    record.state = HealthState::Suspect;
                    record.suspect_since = Some(now);
                    record.failures_while_suspect = 0;
                    warn!(
                        endpoint = %endpoint,
                        consecutive_failures = record.consecutive_failures,
                        cause,
                        "Endpoint marked suspect"
                    );
                }
            }
            HealthState::Suspect => {
                let window_start = record.suspect_since.unwrap_or(now);
                if now.saturating_duration_since(window_start) > window {
                    record.suspect_since = Some(now);
                    record.failures_while_suspect = 1;
                } else {
                    record.failures_while_suspect += 1;
                }

                if record.failures_while_suspect >= self.config.unhealthy_after_failures {
                    record.state = HealthState::Unhealthy;
                    warn!(
                        endpoint = %endpoint,
                        consecutive_failures = record.consecutive_failures,
                        cause,
                        "Endpoint marked unhealthy"
                    );
                }
            }
            HealthState::Unhealthy => {}
        }
    }

    /// Whether the selector may route to this endpoint
    ///
    /// Unknown endpoints are eligible. Suspect endpoints are eligible only if
    /// they have answered successfully at least once.
    pub fn is_eligible(&self, endpoint: &Endpoint) -> bool {
        match self.records.get(endpoint) {
            None => true,
            Some(record) => match record.state {
                HealthState::Healthy => true,
                HealthState::Suspect => record.total_successes > 0,
                HealthState::Unhealthy => false,
            },
        }
    }

    pub fn state(&self, endpoint: &Endpoint) -> HealthState {
        self.records.get(endpoint).map_or(HealthState::Healthy, |r| r.state)
    }

    /// Probe one endpoint and apply the result
    ///
    /// A successful probe is the only way out of Unhealthy. A failed or
    /// timed-out probe counts as a connectivity failure.
    pub async fn probe(&self, endpoint: &Endpoint) -> bool {
        let timeout = self.config.probe_timeout();
        let alive =
            tokio::time::timeout(timeout, self.prober.probe(endpoint)).await.unwrap_or(false);
        self.apply_probe_result(endpoint, alive);
        alive
    }

    fn apply_probe_result(&self, endpoint: &Endpoint, alive: bool) {
        if alive {
            let now = self.clock.now();
            let mut record = self.entry(endpoint);
            record.last_success_time = Some(now);
            if record.state != HealthState::Healthy {
                info!(
                    endpoint = %endpoint,
                    previous = %record.state,
                    "Probe succeeded; endpoint healthy"
                );
            }
            record.mark_healthy();
        } else {
            debug!(endpoint = %endpoint, "Probe failed");
            self.register_failure(endpoint, "probe_failure");
        }
    }

    /// Probe every endpoint concurrently
    pub async fn probe_all(&self, endpoints: &[Endpoint]) -> Vec<(Endpoint, bool)> {
        let results = join_all(endpoints.iter().map(|endpoint| async move {
            let alive = self.probe(endpoint).await;
            (endpoint.clone(), alive)
        }))
        .await;

        let dead = results.iter().filter(|(_, alive)| !alive).count();
        debug!(probed = results.len(), dead, "Health probe round complete");
        results
    }

    /// Copy of every record, ordered by region then URL
    pub fn snapshot(&self) -> Vec<EndpointHealthRecord> {
        let mut records: Vec<EndpointHealthRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| {
            (a.endpoint.region.as_str(), a.endpoint.url.as_str())
                .cmp(&(b.endpoint.region.as_str(), b.endpoint.url.as_str()))
        });
        records
    }

    pub fn probe_interval(&self) -> Duration {
        self.config.probe_interval()
    }

    fn entry(
        &self,
        endpoint: &Endpoint,
    ) -> dashmap::mapref::one::RefMut<'_, Endpoint, EndpointHealthRecord> {
        self.records
            .entry(endpoint.clone())
            .or_insert_with(|| EndpointHealthRecord::new(endpoint.clone()))
    }
}
