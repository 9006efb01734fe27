//! Retry decisions
//!
//! Maps a classified failure plus the operation's retry state to the next
//! step. The decision table is an exhaustive match over [`ClassifiedError`]:
//!
//! | Failure                         | Next step                                   |
//! |---------------------------------|---------------------------------------------|
//! | connection / 5xx                | next candidate, wrap while budget remains   |
//! | timeout on read-like operations | next candidate, one pass                    |
//! | timeout on single-write write   | same endpoint with backoff                  |
//! | timeout on multi-write write    | next write region with backoff              |
//! | throttled                       | same endpoint after the server delay        |
//! | session not available (read)    | same endpoint, then one fallback region     |
//! | stale routing                   | refresh routing, retry once                 |
//! | forbidden write                 | refresh topology, retry on the new primary  |
//! | application                     | terminal                                    |

use std::time::Duration;

use polaris_common::resilience::BackoffStrategy;
use polaris_domain::constants::{
    STATUS_FORBIDDEN, STATUS_NOT_FOUND, SUB_STATUS_READ_SESSION_NOT_AVAILABLE,
    SUB_STATUS_WRITE_FORBIDDEN,
};
use polaris_domain::{ClassifiedError, OperationKind, RetryConfig};

use super::context::RetryContext;
use crate::error::ExhaustionReason;

/// How an operation ends without success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Application { status_code: u16, sub_status: u32 },
    Exhausted(ExhaustionReason),
    Escalate,
}

/// What the orchestrator does after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Move to the next candidate after `delay`. With `wrap`, a spent
    /// candidate list is recomputed and walked again; without it the
    /// operation is exhausted once every candidate was tried.
    NextCandidate { delay: Duration, wrap: bool },
    /// Retry the endpoint that just failed after `delay`
    SameEndpoint { delay: Duration },
    /// Retry once in a region known to hold the session token
    SessionFallback,
    /// Refresh partition routing, then retry the same endpoint
    RefreshRouting,
    /// Refresh topology, then retry on the new primary write endpoint
    RefreshTopology,
    Fail(Terminal),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    write_backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let write_backoff =
            BackoffStrategy::exponential(config.write_backoff_base(), config.write_backoff_max());
        Self { config, write_backoff }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decide the next step and charge the matching counter
    pub fn decide(&self, error: &ClassifiedError, ctx: &mut RetryContext) -> RetryDecision {
        let counters = &mut ctx.counters;
        match error {
            ClassifiedError::ConnectionFailure(_) | ClassifiedError::ServiceUnavailable { .. } => {
                if counters.connection_retries >= self.config.max_connection_retries {
                    return RetryDecision::Fail(Terminal::Exhausted(
                        ExhaustionReason::ConnectionRetries,
                    ));
                }
                counters.connection_retries += 1;
                RetryDecision::NextCandidate { delay: Duration::ZERO, wrap: true }
            }

            ClassifiedError::ResponseTimeout => match ctx.kind {
                OperationKind::Write => {
                    if counters.timeout_retries >= self.config.write_timeout_retries {
                        return RetryDecision::Fail(Terminal::Exhausted(
                            ExhaustionReason::TimeoutRetries,
                        ));
                    }
                    let delay = self.write_backoff.calculate_delay(counters.timeout_retries);
                    counters.timeout_retries += 1;
                    if ctx.multi_write {
                        RetryDecision::NextCandidate { delay, wrap: true }
                    } else {
                        RetryDecision::SameEndpoint { delay }
                    }
                }
                OperationKind::Read | OperationKind::QueryPlan | OperationKind::Metadata => {
                    counters.timeout_retries += 1;
                    RetryDecision::NextCandidate { delay: Duration::ZERO, wrap: false }
                }
            },

            ClassifiedError::Throttled { retry_after } => RetryDecision::SameEndpoint {
                delay: retry_after.unwrap_or_else(|| self.config.default_throttle_delay()),
            },

            ClassifiedError::SessionNotAvailable => {
                if ctx.kind != OperationKind::Read || !ctx.session_scoped {
                    return RetryDecision::Fail(Terminal::Application {
                        status_code: STATUS_NOT_FOUND,
                        sub_status: SUB_STATUS_READ_SESSION_NOT_AVAILABLE,
                    });
                }
                if counters.session_retries < self.config.session_retries {
                    counters.session_retries += 1;
                    RetryDecision::SameEndpoint { delay: self.config.session_retry_delay() }
                } else if !counters.session_fallback_used {
                    counters.session_fallback_used = true;
                    RetryDecision::SessionFallback
                } else {
                    RetryDecision::Fail(Terminal::Exhausted(ExhaustionReason::SessionRetries))
                }
            }

            ClassifiedError::StaleRouting { .. } => {
                if counters.stale_routing_refreshes >= self.config.stale_routing_retries {
                    return RetryDecision::Fail(Terminal::Exhausted(ExhaustionReason::StaleRouting));
                }
                counters.stale_routing_refreshes += 1;
                RetryDecision::RefreshRouting
            }

            ClassifiedError::ForbiddenWrite => {
                if !ctx.kind.is_write() {
                    return RetryDecision::Fail(Terminal::Application {
                        status_code: STATUS_FORBIDDEN,
                        sub_status: SUB_STATUS_WRITE_FORBIDDEN,
                    });
                }
                if counters.topology_refreshed {
                    RetryDecision::Fail(Terminal::Escalate)
                } else {
                    counters.topology_refreshed = true;
                    RetryDecision::RefreshTopology
                }
            }

            ClassifiedError::Application { status_code, sub_status } => {
                RetryDecision::Fail(Terminal::Application {
                    status_code: *status_code,
                    sub_status: *sub_status,
                })
            }
        }
    }
}
