//! Session token wire format and merge semantics
//!
//! A vector token is `version#globalLsn[#regionId=localLsn]*`. A partition
//! token prefixes it with the range id (`rangeId:token`), and a compound
//! token is a comma-separated list of partition tokens:
//!
//! ```text
//! 0:1#50,1:2#40#3=12#5=9
//! ```
//!
//! Merging keeps the highest version, the highest global LSN and, per
//! region, the highest local LSN. The merge is a component-wise maximum, so
//! it is commutative, associative and idempotent.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use polaris_domain::constants::{
    COMPOUND_TOKEN_SEPARATOR, SESSION_TOKEN_PART_SEPARATOR, SESSION_TOKEN_RANGE_SEPARATOR,
    SESSION_TOKEN_REGION_SEPARATOR,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("Malformed session token '{token}': {reason}")]
    Malformed { token: String, reason: &'static str },
}

fn malformed(token: &str, reason: &'static str) -> SessionTokenError {
    SessionTokenError::Malformed { token: token.to_string(), reason }
}

/// Write progress for one partition range
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VectorSessionToken {
    pub version: u64,
    pub global_lsn: u64,
    pub local_lsn_by_region: BTreeMap<u32, u64>,
}

impl VectorSessionToken {
    pub fn new(version: u64, global_lsn: u64) -> Self {
        Self { version, global_lsn, local_lsn_by_region: BTreeMap::new() }
    }

    pub fn with_region_lsn(mut self, region_id: u32, local_lsn: u64) -> Self {
        self.local_lsn_by_region.insert(region_id, local_lsn);
        self
    }

    /// Component-wise maximum of two tokens
    pub fn merge(&self, other: &Self) -> Self {
        let mut local_lsn_by_region = self.local_lsn_by_region.clone();
        for (region, lsn) in &other.local_lsn_by_region {
            local_lsn_by_region
                .entry(*region)
                .and_modify(|current| *current = (*current).max(*lsn))
                .or_insert(*lsn);
        }
        Self {
            version: self.version.max(other.version),
            global_lsn: self.global_lsn.max(other.global_lsn),
            local_lsn_by_region,
        }
    }

    /// Whether this token has at least the progress of `required`
    pub fn satisfies(&self, required: &Self) -> bool {
        self.version >= required.version
            && self.global_lsn >= required.global_lsn
            && required.local_lsn_by_region.iter().all(|(region, lsn)| {
                self.local_lsn_by_region.get(region).is_some_and(|have| have >= lsn)
            })
    }
}

impl FromStr for VectorSessionToken {
    type Err = SessionTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut parts = s.split(SESSION_TOKEN_PART_SEPARATOR);

        let first =
            parts.next().filter(|p| !p.is_empty()).ok_or_else(|| malformed(s, "empty token"))?;
        let Some(second) = parts.next() else {
            // Bare LSN form
            let global_lsn = first.parse().map_err(|_| malformed(s, "invalid global LSN"))?;
            return Ok(Self::new(0, global_lsn));
        };

        let version = first.parse().map_err(|_| malformed(s, "invalid version"))?;
        let global_lsn = second.parse().map_err(|_| malformed(s, "invalid global LSN"))?;
        let mut token = Self::new(version, global_lsn);

        for part in parts {
            let (region, lsn) = part
                .split_once(SESSION_TOKEN_REGION_SEPARATOR)
                .ok_or_else(|| malformed(s, "region progress must be regionId=localLsn"))?;
            let region: u32 = region.parse().map_err(|_| malformed(s, "invalid region id"))?;
            let lsn: u64 = lsn.parse().map_err(|_| malformed(s, "invalid local LSN"))?;
            token.local_lsn_by_region.insert(region, lsn);
        }

        Ok(token)
    }
}

impl fmt::Display for VectorSessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.version, SESSION_TOKEN_PART_SEPARATOR, self.global_lsn)?;
        for (region, lsn) in &self.local_lsn_by_region {
            write!(
                f,
                "{}{}{}{}",
                SESSION_TOKEN_PART_SEPARATOR, region, SESSION_TOKEN_REGION_SEPARATOR, lsn
            )?;
        }
        Ok(())
    }
}

/// Parse a single `rangeId:token` pair
pub fn parse_partition_token(s: &str) -> Result<(String, VectorSessionToken), SessionTokenError> {
    let s = s.trim();
    let (range, token) = s
        .split_once(SESSION_TOKEN_RANGE_SEPARATOR)
        .ok_or_else(|| malformed(s, "partition token must be rangeId:token"))?;
    if range.is_empty() {
        return Err(malformed(s, "empty range id"));
    }
    Ok((range.to_string(), token.parse()?))
}

/// Per-range session tokens, as carried in a request or response header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSessionToken {
    tokens: BTreeMap<String, VectorSessionToken>,
}

impl CompoundSessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn get(&self, range: &str) -> Option<&VectorSessionToken> {
        self.tokens.get(range)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VectorSessionToken)> {
        self.tokens.iter()
    }

    /// Merge one range's token into this compound token
    pub fn merge(&mut self, range: impl Into<String>, token: &VectorSessionToken) {
        self.tokens
            .entry(range.into())
            .and_modify(|current| *current = current.merge(token))
            .or_insert_with(|| token.clone());
    }

    /// Header value, or `None` when there is nothing to send
    pub fn to_header(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl FromStr for CompoundSessionToken {
    type Err = SessionTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut compound = Self::new();
        for part in s.split(COMPOUND_TOKEN_SEPARATOR).filter(|p| !p.trim().is_empty()) {
            let (range, token) = parse_partition_token(part)?;
            compound.merge(range, &token);
        }
        Ok(compound)
    }
}

impl fmt::Display for CompoundSessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (range, token)) in self.tokens.iter().enumerate() {
            if i > 0 {
                write!(f, "{COMPOUND_TOKEN_SEPARATOR}")?;
            }
            write!(f, "{range}{SESSION_TOKEN_RANGE_SEPARATOR}{token}")?;
        }
        Ok(())
    }
}
