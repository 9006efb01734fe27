//! Account metadata document and its conversion into a topology snapshot

use serde::{Deserialize, Serialize};
use url::Url;

use super::operation::ConsistencyLevel;
use super::topology::{Region, TopologySnapshot};
use crate::errors::TopologyError;

/// One entry of `writableLocations` / `readableLocations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLocation {
    pub name: String,
    pub database_account_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyPolicy {
    #[serde(default)]
    pub default_consistency_level: ConsistencyLevel,
}

/// Account metadata as returned by the account endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProperties {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub writable_locations: Vec<AccountLocation>,
    #[serde(default)]
    pub readable_locations: Vec<AccountLocation>,
    #[serde(default)]
    pub enable_multiple_write_locations: bool,
    #[serde(default)]
    pub user_consistency_policy: ConsistencyPolicy,
}

impl AccountProperties {
    /// Build a topology snapshot from this document
    ///
    /// Writable locations come first in their listed order, so the first
    /// writable location becomes the primary write region. Readable-only
    /// locations follow. A location in both lists becomes one region that
    /// serves reads and writes.
    pub fn to_snapshot(&self) -> Result<TopologySnapshot, TopologyError> {
        let mut regions: Vec<Region> = Vec::new();

        for location in &self.writable_locations {
            let url = parse_endpoint(location)?;
            let mut region = Region::read_write(location.name.clone(), url);
            region.is_available_for_read = false;
            regions.push(region);
        }

        for location in &self.readable_locations {
            let url = parse_endpoint(location)?;
            match regions.iter_mut().find(|r| r.is_named(&location.name)) {
                Some(existing) => {
                    existing.read_endpoint = url;
                    existing.is_available_for_read = true;
                }
                None => regions.push(Region::read_only(location.name.clone(), url)),
            }
        }

        // A writable region not listed as readable still serves reads
        if self.readable_locations.is_empty() {
            for region in &mut regions {
                region.is_available_for_read = true;
            }
        }

        TopologySnapshot::new(
            regions,
            self.enable_multiple_write_locations,
            self.user_consistency_policy.default_consistency_level,
        )
    }
}

fn parse_endpoint(location: &AccountLocation) -> Result<Url, TopologyError> {
    Url::parse(&location.database_account_endpoint).map_err(|e| {
        TopologyError::InvalidDocument(format!(
            "region '{}' endpoint '{}': {}",
            location.name, location.database_account_endpoint, e
        ))
    })
}
