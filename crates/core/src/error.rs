//! Terminal errors surfaced by the routing client
//!
//! Transient failures are retried internally and never reach the caller on
//! their own. What does reach the caller always carries the ordered chain of
//! attempts, so "never reachable" can be told apart from "reachable but
//! consistently erroring".

use std::fmt;
use std::time::Duration;

use polaris_common::{ErrorClassification, ErrorSeverity};
use polaris_domain::{ClassifiedError, Endpoint, TopologyError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happened on one candidate during a logical operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(ClassifiedError),
    /// The partition circuit refused the candidate; no network call was made
    SkippedCircuitOpen,
}

/// One entry in an operation's attempt chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based executor call number; skipped candidates reuse the number of
    /// the call that followed them
    pub attempt: u32,
    pub endpoint: Endpoint,
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    pub fn error(&self) -> Option<&ClassifiedError> {
        match &self.outcome {
            AttemptOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Why the retry budget ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExhaustionReason {
    /// No candidate endpoint was available at all
    NoCandidates,
    /// Every candidate was tried or skipped
    CandidatesExhausted,
    ConnectionRetries,
    TimeoutRetries,
    SessionRetries,
    StaleRouting,
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoCandidates => "no candidate endpoints",
            Self::CandidatesExhausted => "all candidate endpoints tried",
            Self::ConnectionRetries => "connection retry budget spent",
            Self::TimeoutRetries => "timeout retry budget spent",
            Self::SessionRetries => "session token never became visible",
            Self::StaleRouting => "routing still stale after refresh",
        };
        f.write_str(text)
    }
}

/// Terminal error of a logical operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("Application error {status_code} (sub-status {sub_status}) from {endpoint}")]
    Application {
        status_code: u16,
        sub_status: u32,
        endpoint: Endpoint,
        attempts: Vec<AttemptRecord>,
    },

    #[error("Operation exhausted after {} attempts: {reason}", .attempts.len())]
    Exhausted {
        attempts: Vec<AttemptRecord>,
        last_error: Option<ClassifiedError>,
        reason: ExhaustionReason,
    },

    #[error("Operation deadline of {timeout:?} exceeded")]
    DeadlineExceeded {
        timeout: Duration,
        attempts: Vec<AttemptRecord>,
        last_error: Option<ClassifiedError>,
    },

    #[error("Operation cancelled")]
    Cancelled { attempts: Vec<AttemptRecord> },

    #[error("Write still forbidden after topology refresh: {last_error}")]
    Escalated { attempts: Vec<AttemptRecord>, last_error: ClassifiedError },

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
}

impl OperationError {
    /// The attempt chain, empty for topology errors
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Application { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. }
            | Self::Cancelled { attempts }
            | Self::Escalated { attempts, .. } => attempts,
            Self::Topology(_) => &[],
        }
    }

    /// Last classified failure, if any attempt failed
    pub fn last_error(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Exhausted { last_error, .. } | Self::DeadlineExceeded { last_error, .. } => {
                last_error.as_ref()
            }
            Self::Escalated { last_error, .. } => Some(last_error),
            _ => self.attempts().iter().rev().find_map(AttemptRecord::error),
        }
    }

    /// True when no endpoint ever produced a response
    ///
    /// Every executed attempt failed with a connection failure, or no
    /// attempt reached the network at all.
    pub fn never_reachable(&self) -> bool {
        match self {
            Self::Application { .. } | Self::Escalated { .. } => false,
            _ => self.attempts().iter().all(|a| {
                matches!(
                    a.outcome,
                    AttemptOutcome::Failed(ClassifiedError::ConnectionFailure(_))
                        | AttemptOutcome::SkippedCircuitOpen
                )
            }),
        }
    }

    /// Distinct endpoints contacted, in first-contact order
    pub fn tried_endpoints(&self) -> Vec<&Endpoint> {
        let mut endpoints: Vec<&Endpoint> = Vec::new();
        for record in self.attempts() {
            if record.outcome != AttemptOutcome::SkippedCircuitOpen
                && !endpoints.contains(&&record.endpoint)
            {
                endpoints.push(&record.endpoint);
            }
        }
        endpoints
    }
}

impl ErrorClassification for OperationError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Exhausted { .. } | Self::DeadlineExceeded { .. } => true,
            Self::Topology(e) => e.is_transient(),
            Self::Application { .. } | Self::Cancelled { .. } | Self::Escalated { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Application { .. } => ErrorSeverity::Warning,
            Self::Cancelled { .. } => ErrorSeverity::Info,
            Self::Exhausted { .. } | Self::DeadlineExceeded { .. } => ErrorSeverity::Error,
            Self::Escalated { .. } | Self::Topology(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Escalated { .. } | Self::Topology(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn endpoint(region: &str) -> Endpoint {
        Endpoint::new(region, Url::parse(&format!("https://{region}.example.com/")).unwrap())
    }

    fn record(attempt: u32, region: &str, outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord { attempt, endpoint: endpoint(region), outcome }
    }

    /// Validates `never_reachable` distinguishes connection-only chains from
    /// chains where an endpoint answered.
    #[test]
    fn test_never_reachable() {
        let unreachable = OperationError::Exhausted {
            attempts: vec![
                record(
                    1,
                    "a",
                    AttemptOutcome::Failed(ClassifiedError::ConnectionFailure("refused".into())),
                ),
                record(2, "b", AttemptOutcome::SkippedCircuitOpen),
            ],
            last_error: Some(ClassifiedError::ConnectionFailure("refused".into())),
            reason: ExhaustionReason::ConnectionRetries,
        };
        assert!(unreachable.never_reachable());

        let erroring = OperationError::Exhausted {
            attempts: vec![record(
                1,
                "a",
                AttemptOutcome::Failed(ClassifiedError::ServiceUnavailable { status_code: 503 }),
            )],
            last_error: Some(ClassifiedError::ServiceUnavailable { status_code: 503 }),
            reason: ExhaustionReason::CandidatesExhausted,
        };
        assert!(!erroring.never_reachable());
    }

    #[test]
    fn test_tried_endpoints_are_deduplicated() {
        let err = OperationError::DeadlineExceeded {
            timeout: Duration::from_secs(1),
            attempts: vec![
                record(1, "a", AttemptOutcome::Failed(ClassifiedError::ResponseTimeout)),
                record(2, "b", AttemptOutcome::SkippedCircuitOpen),
                record(2, "a", AttemptOutcome::Failed(ClassifiedError::ResponseTimeout)),
            ],
            last_error: Some(ClassifiedError::ResponseTimeout),
        };
        let tried = err.tried_endpoints();
        assert_eq!(tried.len(), 1);
        assert_eq!(tried[0].region, "a");
        assert_eq!(err.last_error(), Some(&ClassifiedError::ResponseTimeout));
    }

    #[test]
    fn test_classification() {
        let cancelled = OperationError::Cancelled { attempts: Vec::new() };
        assert!(!cancelled.is_retryable());
        assert_eq!(cancelled.severity(), ErrorSeverity::Info);

        let topology: OperationError = TopologyError::Timeout(10).into();
        assert!(topology.is_retryable());
        assert!(topology.is_critical());
        assert!(topology.never_reachable());
    }
}
