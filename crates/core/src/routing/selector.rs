//! Location selection
//!
//! Turns a topology snapshot plus an operation's routing hints into an
//! ordered list of candidate endpoints. Selection is a pure function of the
//! snapshot, the health tracker and the circuit breaker at call time; the
//! retry orchestrator walks the returned order.

use std::sync::Arc;

use polaris_domain::{
    ClientConfig, ConsistencyLevel, Endpoint, OperationKind, Region, TopologySnapshot,
};
use tracing::{debug, trace};

use crate::circuit::PartitionCircuitBreaker;
use crate::health::HealthTracker;
use crate::request::OperationRequest;

/// Routing inputs for one candidate computation
///
/// `None` for preferred or excluded regions means "use the client default".
/// An empty `partitions` slice skips circuit filtering.
#[derive(Debug, Clone, Copy)]
pub struct CandidateQuery<'a> {
    pub kind: OperationKind,
    pub partitions: &'a [String],
    pub preferred_regions: Option<&'a [String]>,
    pub excluded_regions: Option<&'a [String]>,
    pub consistency: ConsistencyLevel,
}

impl<'a> CandidateQuery<'a> {
    pub fn new(kind: OperationKind, consistency: ConsistencyLevel) -> Self {
        Self {
            kind,
            partitions: &[],
            preferred_regions: None,
            excluded_regions: None,
            consistency,
        }
    }

    /// Query for a request under its effective consistency
    pub fn for_request(request: &'a OperationRequest, consistency: ConsistencyLevel) -> Self {
        Self {
            kind: request.kind,
            partitions: request.circuit_ranges(),
            preferred_regions: request.preferred_regions.as_deref(),
            excluded_regions: request.excluded_regions.as_deref(),
            consistency,
        }
    }
}

/// Produces candidate endpoint orderings
#[derive(Debug, Clone)]
pub struct LocationSelector {
    health: Arc<HealthTracker>,
    breaker: Arc<PartitionCircuitBreaker>,
    preferred_regions: Vec<String>,
    excluded_regions: Vec<String>,
    cross_region_reads_for_strong: bool,
}

impl LocationSelector {
    pub fn new(
        config: &ClientConfig,
        health: Arc<HealthTracker>,
        breaker: Arc<PartitionCircuitBreaker>,
    ) -> Self {
        Self {
            health,
            breaker,
            preferred_regions: config.preferred_regions.clone(),
            excluded_regions: config.excluded_regions.clone(),
            cross_region_reads_for_strong: config.consistency.cross_region_reads_for_strong,
        }
    }

    /// Candidates for an operation kind with explicit region hints
    ///
    /// Uses the account's default consistency and no partition, so the
    /// circuit breaker is not consulted.
    pub fn candidates(
        &self,
        topology: &TopologySnapshot,
        kind: OperationKind,
        preferred_regions: Option<&[String]>,
        excluded_regions: Option<&[String]>,
    ) -> Vec<Endpoint> {
        let query = CandidateQuery {
            preferred_regions,
            excluded_regions,
            ..CandidateQuery::new(kind, topology.default_consistency())
        };
        self.candidates_for(topology, &query)
    }

    /// Ordered candidates for `query`
    ///
    /// Never empty: single-write writes always get the primary write
    /// endpoint, reads always end with the primary read endpoint, and a
    /// fully blocked partition gets its oldest circuit forced half-open.
    pub fn candidates_for(
        &self,
        topology: &TopologySnapshot,
        query: &CandidateQuery<'_>,
    ) -> Vec<Endpoint> {
        if query.kind.is_write() && !topology.enable_multiple_write_locations() {
            return vec![topology.primary_write_endpoint()];
        }

        let preferred = query.preferred_regions.unwrap_or(&self.preferred_regions);
        let excluded = query.excluded_regions.unwrap_or(&self.excluded_regions);
        let is_excluded = |name: &str| excluded.iter().any(|e| e.eq_ignore_ascii_case(name));
        let is_write = query.kind.is_write();

        let capable = |region: &Region| {
            if is_write {
                region.is_available_for_write
            } else {
                region.is_available_for_read
            }
        };
        let endpoint_of = |region: &Region| if is_write { region.write() } else { region.read() };

        let ordered: Vec<&Region> = if !preferred.is_empty() {
            let mut regions: Vec<&Region> = Vec::with_capacity(preferred.len());
            for name in preferred {
                if let Some(region) = topology.region(name) {
                    if !regions.iter().any(|r| r.is_named(&region.name)) {
                        regions.push(region);
                    }
                }
            }
            regions
        } else if !is_write
            && query.consistency.prefers_primary_reads()
            && !self.cross_region_reads_for_strong
        {
            vec![topology.primary_write_region()]
        } else {
            topology.regions().iter().collect()
        };

        let mut candidates: Vec<Endpoint> = ordered
            .into_iter()
            .filter(|region| capable(*region) && !is_excluded(&region.name))
            .map(endpoint_of)
            .filter(|endpoint| self.health.is_eligible(endpoint))
            .collect();

        if is_write {
            if candidates.is_empty() {
                candidates.push(topology.primary_write_endpoint());
            }
        } else {
            let fallback = topology.primary_read_endpoint();
            let primary_excluded = is_excluded(&fallback.region);
            if (!primary_excluded || candidates.is_empty()) && !candidates.contains(&fallback) {
                candidates.push(fallback);
            }
        }

        let filter = query.kind.is_partition_scoped()
            && !query.partitions.is_empty()
            && self.breaker.is_enabled();
        if filter {
            self.filter_blocked(query.partitions, candidates)
        } else {
            candidates
        }
    }

    /// First of `partitions` whose circuit blocks `region`
    fn blocking_range<'p>(&self, partitions: &'p [String], region: &str) -> Option<&'p str> {
        partitions
            .iter()
            .map(String::as_str)
            .find(|partition| self.breaker.is_blocked(partition, region))
    }

    /// Drop candidates blocked on any of `partitions`
    ///
    /// When every candidate is blocked, the oldest open circuit of the range
    /// blocking the first candidate is forced half-open and its region is the
    /// only candidate.
    fn filter_blocked(&self, partitions: &[String], candidates: Vec<Endpoint>) -> Vec<Endpoint> {
        let (open, blocked): (Vec<Endpoint>, Vec<Endpoint>) = candidates
            .into_iter()
            .partition(|endpoint| self.blocking_range(partitions, &endpoint.region).is_none());

        if !open.is_empty() {
            if !blocked.is_empty() {
                trace!(blocked = blocked.len(), "Dropped circuit-blocked candidates");
            }
            return open;
        }

        let Some(partition) =
            blocked.first().and_then(|e| self.blocking_range(partitions, &e.region))
        else {
            return blocked;
        };
        let regions: Vec<&str> = blocked.iter().map(|e| e.region.as_str()).collect();
        let forced = self.breaker.force_half_open_oldest(partition, &regions).map(str::to_string);
        match forced {
            Some(region) => {
                debug!(partition, region = %region, "Routing to forced half-open circuit");
                blocked.into_iter().filter(|e| e.region == region).take(1).collect()
            }
            None => blocked,
        }
    }
}
