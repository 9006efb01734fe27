//! Logical operation requests and their successful outcome

use std::time::Duration;

use polaris_domain::{ConsistencyLevel, Endpoint, ExecutorResponse, OperationKind};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AttemptRecord;

/// A logical operation, possibly attempted several times
///
/// `partition_ranges` lists the ranges the operation targets. Every listed
/// range's circuit gates the request and is charged with its outcome.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub body: Value,
    pub partition_ranges: Vec<String>,
    pub preferred_regions: Option<Vec<String>>,
    pub excluded_regions: Option<Vec<String>>,
    pub consistency: Option<ConsistencyLevel>,
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl OperationRequest {
    pub fn new(kind: OperationKind, body: Value) -> Self {
        Self {
            kind,
            body,
            partition_ranges: Vec::new(),
            preferred_regions: None,
            excluded_regions: None,
            consistency: None,
            timeout: None,
            cancellation: None,
        }
    }

    pub fn read(body: Value) -> Self {
        Self::new(OperationKind::Read, body)
    }

    pub fn write(body: Value) -> Self {
        Self::new(OperationKind::Write, body)
    }

    pub fn metadata(body: Value) -> Self {
        Self::new(OperationKind::Metadata, body)
    }

    pub fn query_plan(body: Value) -> Self {
        Self::new(OperationKind::QueryPlan, body)
    }

    pub fn with_partition(mut self, range: impl Into<String>) -> Self {
        self.partition_ranges.push(range.into());
        self
    }

    pub fn with_partitions<I, S>(mut self, ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_ranges.extend(ranges.into_iter().map(Into::into));
        self
    }

    pub fn with_preferred_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_excluded_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.consistency = Some(consistency);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// First targeted range, used for log fields and routing refresh
    pub fn partition(&self) -> Option<&str> {
        self.circuit_ranges().first().map(String::as_str)
    }

    /// Every range whose circuit gates this request
    ///
    /// Empty for operations that are not partition scoped.
    pub fn circuit_ranges(&self) -> &[String] {
        if self.kind.is_partition_scoped() {
            &self.partition_ranges
        } else {
            &[]
        }
    }
}

/// Result of a successful logical operation
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub operation_id: Uuid,
    pub response: ExecutorResponse,
    /// Endpoint that produced the response
    pub endpoint: Endpoint,
    /// Executor calls beyond the first
    pub retry_count: u32,
    pub attempts: Vec<AttemptRecord>,
}
