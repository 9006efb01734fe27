//! Operation kinds, consistency levels and executor responses

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// What a logical operation does, which drives routing and retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Read,
    Write,
    QueryPlan,
    Metadata,
}

impl OperationKind {
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }

    /// Reads and writes target a partition range; metadata and query plan
    /// calls do not and are exempt from partition circuits.
    pub fn is_partition_scoped(self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }
}

impl_domain_enum_conversions!(OperationKind {
    Read => "Read",
    Write => "Write",
    QueryPlan => "QueryPlan",
    Metadata => "Metadata",
});

/// Account or request consistency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    Strong,
    BoundedStaleness,
    #[default]
    Session,
    ConsistentPrefix,
    Eventual,
}

impl ConsistencyLevel {
    /// Session tokens are only attached and tracked under Session
    pub fn uses_session_tokens(self) -> bool {
        matches!(self, Self::Session)
    }

    /// Levels whose reads are pinned to the primary region unless
    /// cross-region reads are explicitly allowed
    pub fn prefers_primary_reads(self) -> bool {
        matches!(self, Self::Strong | Self::BoundedStaleness)
    }
}

impl_domain_enum_conversions!(ConsistencyLevel {
    Strong => "Strong",
    BoundedStaleness => "BoundedStaleness",
    Session => "Session",
    ConsistentPrefix => "ConsistentPrefix",
    Eventual => "Eventual",
});

/// Successful response returned by the request executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResponse {
    pub status_code: u16,
    #[serde(default)]
    pub body: serde_json::Value,
    /// Session token header (`rangeId:token[,rangeId:token]*`) if present
    #[serde(default)]
    pub session_token: Option<String>,
}

impl ExecutorResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status_code: 200, body, session_token: None }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}
