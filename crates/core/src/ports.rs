//! Port interfaces for the routing core
//!
//! These traits define the boundaries between routing logic and the
//! collaborators that perform network I/O: the wire-level request executor,
//! the account metadata reader and the endpoint liveness prober.

use async_trait::async_trait;
use polaris_domain::{AccountProperties, ClassifiedError, Endpoint, ExecutorResponse, TopologyError};

use crate::request::OperationRequest;

/// Performs the actual wire call for one attempt
///
/// The routing core decides which endpoint and which session token; the
/// executor sends the request and classifies any failure.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Send `request` to `endpoint`, attaching `session_token` when present
    async fn execute(
        &self,
        endpoint: &Endpoint,
        request: &OperationRequest,
        session_token: Option<&str>,
    ) -> Result<ExecutorResponse, ClassifiedError>;

    /// Refresh the partition routing table after a stale-routing failure
    async fn refresh_routing(&self, _partition: Option<&str>) {}
}

/// Reads the account metadata document used to build the topology
#[async_trait]
pub trait AccountMetadataReader: Send + Sync {
    async fn read_account(&self) -> Result<AccountProperties, TopologyError>;
}

/// Liveness check for a single endpoint, independent of user traffic
#[async_trait]
pub trait EndpointProber: Send + Sync {
    /// Returns `true` when the endpoint answered
    async fn probe(&self, endpoint: &Endpoint) -> bool;
}
