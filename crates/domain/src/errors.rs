//! Error types used throughout the routing crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to obtain or validate a topology snapshot
///
/// Cloneable so a single coalesced refresh can hand the same outcome to
/// every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TopologyError {
    #[error("Account metadata lists no write region")]
    NoWriteRegion,

    #[error("Account metadata lists region '{0}' more than once with conflicting endpoints")]
    DuplicateRegion(String),

    #[error("Invalid account metadata: {0}")]
    InvalidDocument(String),

    #[error("Account metadata endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("Account metadata request timed out after {0} ms")]
    Timeout(u64),

    #[error("Topology store is shut down")]
    Shutdown,
}

impl TopologyError {
    /// Whether another refresh attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Main error type for Polaris client construction and maintenance
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum PolarisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Polaris operations
pub type Result<T> = std::result::Result<T, PolarisError>;
