//! Regions, endpoints and the immutable topology snapshot

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::operation::ConsistencyLevel;
use crate::errors::TopologyError;

/// A regional endpoint the executor can send requests to
///
/// Identity for health records is the (region, url) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub region: String,
    pub url: Url,
}

impl Endpoint {
    pub fn new(region: impl Into<String>, url: Url) -> Self {
        Self { region: region.into(), url }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.region, self.url)
    }
}

/// A geographic deployment with its own read and write endpoints
///
/// Immutable once published; a refresh replaces the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub read_endpoint: Url,
    pub write_endpoint: Url,
    pub is_available_for_read: bool,
    pub is_available_for_write: bool,
}

impl Region {
    /// Region that serves both reads and writes on one URL
    pub fn read_write(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            read_endpoint: url.clone(),
            write_endpoint: url,
            is_available_for_read: true,
            is_available_for_write: true,
        }
    }

    /// Region that only serves reads
    pub fn read_only(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            read_endpoint: url.clone(),
            write_endpoint: url,
            is_available_for_read: true,
            is_available_for_write: false,
        }
    }

    pub fn read(&self) -> Endpoint {
        Endpoint::new(self.name.clone(), self.read_endpoint.clone())
    }

    pub fn write(&self) -> Endpoint {
        Endpoint::new(self.name.clone(), self.write_endpoint.clone())
    }

    /// Case-insensitive region name match
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Immutable point-in-time view of the account's regions
///
/// Invariant: at least one region is available for writes. The first
/// write-capable region in topology order is the primary write region.
/// Deserialization goes through [`TopologySnapshot::new`], so a stored
/// snapshot is held to the same invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord")]
pub struct TopologySnapshot {
    regions: Vec<Region>,
    enable_multiple_write_locations: bool,
    default_consistency: ConsistencyLevel,
    primary_index: usize,
    version: u64,
    refreshed_at: DateTime<Utc>,
}

impl TopologySnapshot {
    /// Build a snapshot, rejecting topologies without a write region
    ///
    /// # Errors
    ///
    /// - [`TopologyError::NoWriteRegion`] when no region accepts writes
    /// - [`TopologyError::DuplicateRegion`] when a region name repeats
    pub fn new(
        regions: Vec<Region>,
        enable_multiple_write_locations: bool,
        default_consistency: ConsistencyLevel,
    ) -> Result<Self, TopologyError> {
        for (i, region) in regions.iter().enumerate() {
            if regions[..i].iter().any(|r| r.is_named(&region.name)) {
                return Err(TopologyError::DuplicateRegion(region.name.clone()));
            }
        }

        let primary_index = regions
            .iter()
            .position(|r| r.is_available_for_write)
            .ok_or(TopologyError::NoWriteRegion)?;

        Ok(Self {
            regions,
            enable_multiple_write_locations,
            default_consistency,
            primary_index,
            version: 0,
            refreshed_at: Utc::now(),
        })
    }

    /// Stamp the publication version
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.is_named(name))
    }

    pub fn write_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.is_available_for_write)
    }

    pub fn read_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.is_available_for_read)
    }

    /// The account's primary write region
    pub fn primary_write_region(&self) -> &Region {
        &self.regions[self.primary_index]
    }

    pub fn primary_write_endpoint(&self) -> Endpoint {
        self.primary_write_region().write()
    }

    /// Read endpoint of the primary region, used as the read fallback
    pub fn primary_read_endpoint(&self) -> Endpoint {
        self.primary_write_region().read()
    }

    pub fn enable_multiple_write_locations(&self) -> bool {
        self.enable_multiple_write_locations
    }

    pub fn default_consistency(&self) -> ConsistencyLevel {
        self.default_consistency
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Every distinct endpoint in the topology, in topology order
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = Vec::with_capacity(self.regions.len() * 2);
        for region in &self.regions {
            for endpoint in [region.read(), region.write()] {
                if !endpoints.contains(&endpoint) {
                    endpoints.push(endpoint);
                }
            }
        }
        endpoints
    }
}

/// Wire form of [`TopologySnapshot`]; the primary index is recomputed
#[derive(Deserialize)]
struct SnapshotRecord {
    regions: Vec<Region>,
    enable_multiple_write_locations: bool,
    default_consistency: ConsistencyLevel,
    #[serde(default)]
    version: u64,
    refreshed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SnapshotRecord> for TopologySnapshot {
    type Error = TopologyError;

    fn try_from(record: SnapshotRecord) -> Result<Self, Self::Error> {
        let mut snapshot = Self::new(
            record.regions,
            record.enable_multiple_write_locations,
            record.default_consistency,
        )?
        .with_version(record.version);
        if let Some(refreshed_at) = record.refreshed_at {
            snapshot.refreshed_at = refreshed_at;
        }
        Ok(snapshot)
    }
}
