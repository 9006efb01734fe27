//! Session token store
//!
//! Per-range session tokens observed by this client. Entries are created on
//! first contact with a range and updated by every response that carries a
//! token; they are never deleted (bounded by the account's range count).
//!
//! Updates lock a single dashmap entry, so requests to unrelated ranges never
//! contend.

use std::collections::BTreeSet;

use dashmap::DashMap;
use tracing::trace;

use super::token::{CompoundSessionToken, SessionTokenError, VectorSessionToken};

#[derive(Debug, Default)]
pub struct SessionTokenStore {
    tokens: DashMap<String, VectorSessionToken>,
    /// Highest token seen from each region, per range
    progress: DashMap<(String, String), VectorSessionToken>,
}

impl SessionTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, range: &str) -> Option<VectorSessionToken> {
        self.tokens.get(range).map(|t| t.clone())
    }

    /// Merge an incoming token for `range`
    pub fn merge(&self, range: &str, incoming: &VectorSessionToken) {
        self.tokens
            .entry(range.to_string())
            .and_modify(|current| *current = current.merge(incoming))
            .or_insert_with(|| incoming.clone());
    }

    /// Tokens for exactly the given ranges
    ///
    /// Ranges without a token are omitted, as are ranges not listed, so a
    /// read never waits on progress of partitions it does not touch.
    pub fn compound_token_for<S: AsRef<str>>(&self, ranges: &[S]) -> CompoundSessionToken {
        let mut compound = CompoundSessionToken::new();
        for range in ranges {
            if let Some(token) = self.tokens.get(range.as_ref()) {
                compound.merge(range.as_ref(), token.value());
            }
        }
        compound
    }

    /// Merge every partition token in a response header from `region`
    ///
    /// # Errors
    ///
    /// Returns [`SessionTokenError`] if the header is malformed; nothing is
    /// merged in that case.
    pub fn merge_response(&self, header: &str, region: &str) -> Result<(), SessionTokenError> {
        let compound: CompoundSessionToken = header.parse()?;
        let region = region.to_ascii_lowercase();
        for (range, token) in compound.iter() {
            self.merge(range, token);
            self.progress
                .entry((range.clone(), region.clone()))
                .and_modify(|current| *current = current.merge(token))
                .or_insert_with(|| token.clone());
        }
        trace!(region = %region, ranges = compound.len(), "Merged response session token");
        Ok(())
    }

    /// Regions known to have reached `required` for `range`, sorted by name
    pub fn regions_satisfying(&self, range: &str, required: &VectorSessionToken) -> Vec<String> {
        let regions: BTreeSet<String> = self
            .progress
            .iter()
            .filter(|entry| entry.key().0 == range && entry.value().satisfies(required))
            .map(|entry| entry.key().1.clone())
            .collect();
        regions.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
