//! Per-operation retry state
//!
//! One [`RetryContext`] lives for the duration of a logical operation. It
//! owns the attempt chain and the per-policy counters, and is consumed when
//! the operation reaches a terminal outcome.

use std::time::Duration;

use polaris_domain::{ClassifiedError, Endpoint, OperationKind};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AttemptOutcome, AttemptRecord, ExhaustionReason, OperationError};

/// Per-policy retry counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryCounters {
    pub connection_retries: u32,
    pub timeout_retries: u32,
    pub session_retries: u32,
    pub session_fallback_used: bool,
    pub stale_routing_refreshes: u32,
    pub topology_refreshed: bool,
}

/// Why the operation stopped before a terminal classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

#[derive(Debug)]
pub struct RetryContext {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    /// Session tokens are attached and session retries apply
    pub session_scoped: bool,
    /// Account accepts writes in more than one region
    pub multi_write: bool,
    pub counters: RetryCounters,
    started_at: Instant,
    timeout: Duration,
    executor_calls: u32,
    attempts: Vec<AttemptRecord>,
    last_error: Option<ClassifiedError>,
}

impl RetryContext {
    pub fn new(
        operation_id: Uuid,
        kind: OperationKind,
        timeout: Duration,
        session_scoped: bool,
        multi_write: bool,
    ) -> Self {
        Self {
            operation_id,
            kind,
            session_scoped,
            multi_write,
            counters: RetryCounters::default(),
            started_at: Instant::now(),
            timeout,
            executor_calls: 0,
            attempts: Vec::new(),
            last_error: None,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether waiting `delay` from now would pass the deadline
    pub fn would_overrun(&self, delay: Duration) -> bool {
        Instant::now() + delay > self.deadline()
    }

    /// Start an executor call; returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.executor_calls += 1;
        self.executor_calls
    }

    pub fn executor_calls(&self) -> u32 {
        self.executor_calls
    }

    /// Executor calls beyond the first
    pub fn retry_count(&self) -> u32 {
        self.executor_calls.saturating_sub(1)
    }

    pub fn record_success(&mut self, endpoint: Endpoint) {
        self.push(endpoint, AttemptOutcome::Succeeded);
    }

    pub fn record_failure(&mut self, endpoint: Endpoint, error: ClassifiedError) {
        self.last_error = Some(error.clone());
        self.push(endpoint, AttemptOutcome::Failed(error));
    }

    /// A candidate refused by its partition circuit; no call was made
    pub fn record_skip(&mut self, endpoint: Endpoint) {
        self.push(endpoint, AttemptOutcome::SkippedCircuitOpen);
    }

    fn push(&mut self, endpoint: Endpoint, outcome: AttemptOutcome) {
        let attempt = self.executor_calls.max(1);
        self.attempts.push(AttemptRecord { attempt, endpoint, outcome });
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn last_error(&self) -> Option<&ClassifiedError> {
        self.last_error.as_ref()
    }

    /// Endpoints actually called, deduplicated, in first-call order
    pub fn tried_endpoints(&self) -> Vec<&Endpoint> {
        let mut tried: Vec<&Endpoint> = Vec::new();
        for record in &self.attempts {
            let skipped = record.outcome == AttemptOutcome::SkippedCircuitOpen;
            if !skipped && !tried.contains(&&record.endpoint) {
                tried.push(&record.endpoint);
            }
        }
        tried
    }

    pub fn into_attempts(self) -> Vec<AttemptRecord> {
        self.attempts
    }

    pub fn exhausted(self, reason: ExhaustionReason) -> OperationError {
        OperationError::Exhausted { last_error: self.last_error, attempts: self.attempts, reason }
    }

    pub fn interrupted(self, interruption: Interruption) -> OperationError {
        match interruption {
            Interruption::Cancelled => OperationError::Cancelled { attempts: self.attempts },
            Interruption::DeadlineExceeded => OperationError::DeadlineExceeded {
                timeout: self.timeout,
                attempts: self.attempts,
                last_error: self.last_error,
            },
        }
    }

    pub fn escalated(self, last_error: ClassifiedError) -> OperationError {
        OperationError::Escalated { attempts: self.attempts, last_error }
    }

    pub fn application(
        self,
        status_code: u16,
        sub_status: u32,
        endpoint: Endpoint,
    ) -> OperationError {
        OperationError::Application { status_code, sub_status, endpoint, attempts: self.attempts }
    }
}
