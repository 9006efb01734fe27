//! Closed taxonomy of attempt failures
//!
//! Every failed executor call is reduced to one [`ClassifiedError`] variant.
//! Retry policy is an explicit match over this set.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    STATUS_FORBIDDEN, STATUS_GONE, STATUS_NOT_FOUND, STATUS_REQUEST_TIMEOUT,
    STATUS_TOO_MANY_REQUESTS, SUB_STATUS_READ_SESSION_NOT_AVAILABLE, SUB_STATUS_WRITE_FORBIDDEN,
};

/// Classified outcome of a failed attempt
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifiedError {
    /// The endpoint could not be reached
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// The request was sent but no response arrived in time
    #[error("Response timeout")]
    ResponseTimeout,

    /// Rate limited; retry after the server-suggested delay
    #[error("Throttled (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },

    /// Partition moved or split; routing information is stale
    #[error("Stale routing (sub-status {sub_status})")]
    StaleRouting { sub_status: u32 },

    /// The region no longer accepts writes
    #[error("Write forbidden in this region")]
    ForbiddenWrite,

    /// The replica has not yet caught up to the session token
    #[error("Session token not yet visible")]
    SessionNotAvailable,

    /// Server-side 5xx failure
    #[error("Service unavailable (status {status_code})")]
    ServiceUnavailable { status_code: u16 },

    /// Terminal application error (not found, conflict, precondition failed)
    #[error("Application error (status {status_code}, sub-status {sub_status})")]
    Application { status_code: u16, sub_status: u32 },
}

/// Raw signals observed for one failed attempt, before classification
///
/// A single failure can carry several signals (a timed-out request that
/// also had a 429 in flight). [`ClassifiedError::classify`] resolves them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSignals {
    pub connection_error: Option<String>,
    pub timed_out: bool,
    pub status_code: Option<u16>,
    pub sub_status: Option<u32>,
    pub retry_after: Option<Duration>,
}

impl FailureSignals {
    pub fn connection(message: impl Into<String>) -> Self {
        Self { connection_error: Some(message.into()), ..Default::default() }
    }

    pub fn timeout() -> Self {
        Self { timed_out: true, ..Default::default() }
    }

    pub fn status(status_code: u16, sub_status: Option<u32>) -> Self {
        Self { status_code: Some(status_code), sub_status, ..Default::default() }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl ClassifiedError {
    /// Reduce raw failure signals to a single classification
    ///
    /// Precedence: connection > timeout > throttling > status code.
    pub fn classify(signals: FailureSignals) -> Self {
        if let Some(message) = signals.connection_error {
            return Self::ConnectionFailure(message);
        }
        if signals.timed_out {
            return Self::ResponseTimeout;
        }
        match signals.status_code {
            Some(status) => Self::from_status(status, signals.sub_status, signals.retry_after),
            None => Self::ConnectionFailure("no response received".to_string()),
        }
    }

    /// Classify an HTTP status / sub-status pair
    pub fn from_status(
        status_code: u16,
        sub_status: Option<u32>,
        retry_after: Option<Duration>,
    ) -> Self {
        let sub = sub_status.unwrap_or(0);
        match (status_code, sub) {
            (STATUS_TOO_MANY_REQUESTS, _) => Self::Throttled { retry_after },
            (STATUS_REQUEST_TIMEOUT, _) => Self::ResponseTimeout,
            (STATUS_GONE, sub_status) => Self::StaleRouting { sub_status },
            (STATUS_FORBIDDEN, SUB_STATUS_WRITE_FORBIDDEN) => Self::ForbiddenWrite,
            (STATUS_NOT_FOUND, SUB_STATUS_READ_SESSION_NOT_AVAILABLE) => Self::SessionNotAvailable,
            (500..=599, _) => Self::ServiceUnavailable { status_code },
            (status_code, sub_status) => Self::Application { status_code, sub_status },
        }
    }

    /// Only connectivity and 5xx-class failures degrade endpoint health
    pub fn affects_endpoint_health(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure(_) | Self::ResponseTimeout | Self::ServiceUnavailable { .. }
        )
    }

    /// Failures that count against a partition circuit
    pub fn counts_as_partition_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure(_)
                | Self::ResponseTimeout
                | Self::ServiceUnavailable { .. }
                | Self::StaleRouting { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Application { .. })
    }

    /// Short stable label for structured logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectionFailure(_) => "connection_failure",
            Self::ResponseTimeout => "response_timeout",
            Self::Throttled { .. } => "throttled",
            Self::StaleRouting { .. } => "stale_routing",
            Self::ForbiddenWrite => "forbidden_write",
            Self::SessionNotAvailable => "session_not_available",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Application { .. } => "application",
        }
    }
}
