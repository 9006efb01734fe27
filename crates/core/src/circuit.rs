//! Partition-level circuit breaker
//!
//! Circuits are keyed by (partition range, region), so a failing replica set
//! does not penalise other partitions served by the same regional endpoint.
//! Each key lives in its own dashmap shard entry; unrelated partitions never
//! contend on a lock.
//!
//! A circuit opens on either condition:
//! - `consecutive_failure_threshold` failures in a row
//! - at least `minimum_requests` outcomes in the sliding window with a
//!   failure rate of at least `failure_rate_threshold`
//!
//! After `cooldown` the next `allow` moves the circuit to HalfOpen and admits
//! exactly one probe request. The probe's result closes or re-opens it. A
//! probe that never reports is abandoned after another cooldown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use polaris_common::resilience::{CircuitState, Clock, OutcomeWindow, SystemClock};
use polaris_domain::constants::BREAKER_WINDOW_CAPACITY;
use polaris_domain::CircuitBreakerConfig;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CircuitKey {
    partition: String,
    region: String,
}

impl CircuitKey {
    fn new(partition: &str, region: &str) -> Self {
        Self { partition: partition.to_string(), region: region.to_ascii_lowercase() }
    }
}

#[derive(Debug)]
struct PartitionCircuit {
    region: String,
    state: CircuitState,
    consecutive_failures: u32,
    window: OutcomeWindow,
    opened_at: Option<Instant>,
    probe_started_at: Option<Instant>,
}

impl PartitionCircuit {
    fn new(region: &str, config: &CircuitBreakerConfig) -> Self {
        Self {
            region: region.to_string(),
            state: CircuitState::Closed,
            consecutive_failures: 0,
            window: OutcomeWindow::new(config.window(), BREAKER_WINDOW_CAPACITY),
            opened_at: None,
            probe_started_at: None,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_started_at = None;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.window.clear();
        self.opened_at = None;
        self.probe_started_at = None;
    }

    fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        self.opened_at.map_or(true, |at| now.saturating_duration_since(at) >= cooldown)
    }

    fn probe_in_flight(&self, now: Instant, cooldown: Duration) -> bool {
        self.probe_started_at.is_some_and(|at| now.saturating_duration_since(at) < cooldown)
    }
}

/// Point-in-time view of one circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub partition: String,
    pub region: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub open_for: Option<Duration>,
}

/// Per-(partition, region) circuit breaker
pub struct PartitionCircuitBreaker {
    circuits: DashMap<CircuitKey, PartitionCircuit>,
    clock: Arc<dyn Clock>,
    config: CircuitBreakerConfig,
}

impl std::fmt::Debug for PartitionCircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionCircuitBreaker")
            .field("circuits", &self.circuits.len())
            .field("enabled", &self.config.enabled)
            .finish()
    }
}

impl PartitionCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self { circuits: DashMap::new(), clock, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether a request to (partition, region) may go out now
    ///
    /// Claims the HalfOpen probe slot when it returns `true` for a circuit
    /// whose cooldown has elapsed.
    pub fn allow(&self, partition: &str, region: &str) -> bool {
        if !self.config.enabled {
            return true;
        }
        let Some(mut circuit) = self.circuits.get_mut(&CircuitKey::new(partition, region)) else {
            return true;
        };

        let now = self.clock.now();
        let cooldown = self.config.cooldown();
        match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if circuit.cooldown_elapsed(now, cooldown) {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.probe_started_at = Some(now);
                    info!(partition, region, "Circuit half-open; admitting probe");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if circuit.probe_in_flight(now, cooldown) {
                    false
                } else {
                    if circuit.probe_started_at.is_some() {
                        debug!(partition, region, "Abandoning unreported half-open probe");
                    }
                    circuit.probe_started_at = Some(now);
                    true
                }
            }
        }
    }

    /// Admit a request spanning several ranges to `region`
    ///
    /// Every range's circuit must admit it. No half-open slot is claimed
    /// unless all of them would admit.
    pub fn allow_all<S: AsRef<str>>(&self, partitions: &[S], region: &str) -> bool {
        if partitions.iter().any(|p| self.is_blocked(p.as_ref(), region)) {
            return false;
        }
        partitions.iter().fold(true, |admitted, p| self.allow(p.as_ref(), region) && admitted)
    }

    /// Non-mutating check used to order candidates
    pub fn is_blocked(&self, partition: &str, region: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(circuit) = self.circuits.get(&CircuitKey::new(partition, region)) else {
            return false;
        };
        let now = self.clock.now();
        let cooldown = self.config.cooldown();
        match circuit.state {
            CircuitState::Closed => false,
            CircuitState::Open => !circuit.cooldown_elapsed(now, cooldown),
            CircuitState::HalfOpen => circuit.probe_in_flight(now, cooldown),
        }
    }

    /// Report the outcome of a request to (partition, region)
    pub fn on_result(&self, partition: &str, region: &str, success: bool) {
        if !self.config.enabled {
            return;
        }
        let now = self.clock.now();
        let mut circuit = self
            .circuits
            .entry(CircuitKey::new(partition, region))
            .or_insert_with(|| PartitionCircuit::new(region, &self.config));
        circuit.window.record(now, success);

        match circuit.state {
            CircuitState::HalfOpen => {
                if success {
                    circuit.close();
                    info!(partition, region, "Circuit closed after successful probe");
                } else {
                    circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
                    circuit.open(now);
                    warn!(partition, region, "Half-open probe failed; circuit re-opened");
                }
            }
            CircuitState::Closed => {
                if success {
                    circuit.consecutive_failures = 0;
                    return;
                }
                circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);

                let total = circuit.window.total(now);
                let failure_rate = circuit.window.failure_rate(now);
                let consecutive_trip =
                    circuit.consecutive_failures >= self.config.consecutive_failure_threshold;
                let rate_trip = total >= self.config.minimum_requests as usize
                    && failure_rate >= self.config.failure_rate_threshold;

                if consecutive_trip || rate_trip {
                    circuit.open(now);
                    warn!(
                        partition,
                        region,
                        consecutive_failures = circuit.consecutive_failures,
                        failure_rate,
                        window_requests = total,
                        "Circuit opened"
                    );
                }
            }
            CircuitState::Open => {
                if !success {
                    circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
                }
            }
        }
    }

    /// Force the longest-open circuit among `regions` to HalfOpen
    ///
    /// Used when every candidate for a partition is blocked, so at least one
    /// request can go out. Returns the region whose circuit was forced, or
    /// `None` when a half-open probe is already in flight for one of
    /// `regions`; that probe is the one request allowed through.
    pub fn force_half_open_oldest<'a>(
        &self,
        partition: &str,
        regions: &[&'a str],
    ) -> Option<&'a str> {
        let now = self.clock.now();
        let cooldown = self.config.cooldown();

        let mut oldest: Option<(&'a str, Option<Instant>)> = None;
        for region in regions {
            let Some(circuit) = self.circuits.get(&CircuitKey::new(partition, region)) else {
                continue;
            };
            match circuit.state {
                CircuitState::HalfOpen if circuit.probe_in_flight(now, cooldown) => return None,
                CircuitState::Open => {
                    if oldest.map_or(true, |(_, at)| circuit.opened_at < at) {
                        oldest = Some((*region, circuit.opened_at));
                    }
                }
                _ => {}
            }
        }
        let (oldest, _) = oldest?;

        let mut circuit = self.circuits.get_mut(&CircuitKey::new(partition, oldest))?;
        if circuit.state != CircuitState::Open {
            return None;
        }
        circuit.state = CircuitState::HalfOpen;
        circuit.probe_started_at = None;
        drop(circuit);

        warn!(
            partition,
            region = oldest,
            "All candidates blocked; forcing oldest circuit half-open"
        );
        Some(oldest)
    }

    pub fn state(&self, partition: &str, region: &str) -> CircuitState {
        self.circuits
            .get(&CircuitKey::new(partition, region))
            .map_or(CircuitState::Closed, |c| c.state)
    }

    /// Every known circuit, ordered by partition then region
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let now = self.clock.now();
        let mut circuits: Vec<CircuitSnapshot> = self
            .circuits
            .iter()
            .map(|entry| CircuitSnapshot {
                partition: entry.key().partition.clone(),
                region: entry.value().region.clone(),
                state: entry.value().state,
                consecutive_failures: entry.value().consecutive_failures,
                open_for: entry.value().opened_at.map(|at| now.saturating_duration_since(at)),
            })
            .collect();
        circuits.sort_by(|a, b| (&a.partition, &a.region).cmp(&(&b.partition, &b.region)));
        circuits
    }
}
