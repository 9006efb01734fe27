//! Retry orchestration
//!
//! Drives one logical operation from its first attempt to a terminal
//! outcome. Attempts are strictly sequential. Before each attempt the
//! partition circuit is consulted; after each attempt the health tracker and
//! circuit breaker are updated, then [`RetryPolicy`] decides the next step.
//!
//! Every wait (executor call, backoff, refresh) is raced against the
//! operation deadline and the caller's cancellation token.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use polaris_domain::{
    ClassifiedError, ConsistencyLevel, Endpoint, ExecutorResponse, OperationKind, TopologySnapshot,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use super::context::{Interruption, RetryContext};
use super::policy::{RetryDecision, RetryPolicy, Terminal};
use crate::circuit::PartitionCircuitBreaker;
use crate::error::{ExhaustionReason, OperationError};
use crate::health::HealthTracker;
use crate::ports::RequestExecutor;
use crate::request::{OperationOutcome, OperationRequest};
use crate::routing::{CandidateQuery, LocationSelector};
use crate::session::SessionTokenStore;
use crate::topology::TopologyStore;

/// Shared collaborators of the orchestrator
#[derive(Clone)]
pub struct RetryDependencies {
    pub executor: Arc<dyn RequestExecutor>,
    pub topology: Arc<TopologyStore>,
    pub selector: LocationSelector,
    pub health: Arc<HealthTracker>,
    pub breaker: Arc<PartitionCircuitBreaker>,
    pub sessions: Arc<SessionTokenStore>,
}

pub struct RetryOrchestrator {
    deps: RetryDependencies,
    policy: RetryPolicy,
    consistency_override: Option<ConsistencyLevel>,
    write_failures_before_refresh: u32,
    write_failure_streak: AtomicU32,
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("policy", &self.policy)
            .field("consistency_override", &self.consistency_override)
            .finish()
    }
}

/// Where the next attempt goes
struct Cursor {
    candidates: Vec<Endpoint>,
    index: usize,
    /// Overrides the candidate list for exactly one attempt
    pinned: Option<Endpoint>,
}

impl Cursor {
    fn new(candidates: Vec<Endpoint>) -> Self {
        Self { candidates, index: 0, pinned: None }
    }

    fn current(&mut self) -> Option<Endpoint> {
        self.pinned.take().or_else(|| self.candidates.get(self.index).cloned())
    }

    /// Step to the next candidate; `false` once the list is spent
    fn advance(&mut self) -> bool {
        self.index += 1;
        self.index < self.candidates.len()
    }

    fn reset(&mut self, candidates: Vec<Endpoint>) {
        self.candidates = candidates;
        self.index = 0;
    }
}

impl RetryOrchestrator {
    pub fn new(
        deps: RetryDependencies,
        policy: RetryPolicy,
        consistency_override: Option<ConsistencyLevel>,
        write_failures_before_refresh: u32,
    ) -> Self {
        Self {
            deps,
            policy,
            consistency_override,
            write_failures_before_refresh,
            write_failure_streak: AtomicU32::new(0),
        }
    }

    /// Consistency the operation runs under: request override, then client
    /// override, then the account default
    pub fn effective_consistency(
        &self,
        request: &OperationRequest,
        topology: &TopologySnapshot,
    ) -> ConsistencyLevel {
        request
            .consistency
            .or(self.consistency_override)
            .unwrap_or_else(|| topology.default_consistency())
    }

    /// Run `request` to a terminal outcome
    ///
    /// # Errors
    ///
    /// Returns an [`OperationError`] carrying the full attempt chain when
    /// the operation fails terminally, exhausts its retry budget, passes its
    /// deadline or is cancelled.
    #[instrument(
        name = "perform_operation",
        skip_all,
        fields(
            kind = %request.kind,
            partition = request.partition().unwrap_or(""),
            operation_id = tracing::field::Empty
        )
    )]
    pub async fn execute(
        &self,
        request: OperationRequest,
    ) -> Result<OperationOutcome, OperationError> {
        let operation_id = Uuid::new_v4();
        Span::current().record("operation_id", tracing::field::display(operation_id));

        let topology = self.deps.topology.current();
        let consistency = self.effective_consistency(&request, &topology);
        let timeout = request.timeout.unwrap_or_else(|| self.policy.config().operation_timeout());
        let mut ctx = RetryContext::new(
            operation_id,
            request.kind,
            timeout,
            consistency.uses_session_tokens(),
            topology.enable_multiple_write_locations(),
        );
        let cancel = request.cancellation.clone().unwrap_or_default();
        let deadline = ctx.deadline();

        let mut cursor = Cursor::new(self.candidates(&topology, &request, consistency));
        drop(topology);

        loop {
            let Some(endpoint) = cursor.current() else {
                let reason = if ctx.attempts().is_empty() {
                    ExhaustionReason::NoCandidates
                } else {
                    ExhaustionReason::CandidatesExhausted
                };
                return Err(ctx.exhausted(reason));
            };

            let breaker_ranges = self.breaker_ranges(&request, ctx.multi_write);
            if !self.deps.breaker.allow_all(breaker_ranges, &endpoint.region) {
                debug!(
                    endpoint = %endpoint.url,
                    region = %endpoint.region,
                    "Circuit open; skipping candidate"
                );
                ctx.record_skip(endpoint);
                if !cursor.advance() {
                    return Err(ctx.exhausted(ExhaustionReason::CandidatesExhausted));
                }
                continue;
            }

            let session_token = if ctx.session_scoped {
                self.deps.sessions.compound_token_for(&request.partition_ranges).to_header()
            } else {
                None
            };

            let attempt = ctx.begin_attempt();
            debug!(
                attempt,
                endpoint = %endpoint.url,
                region = %endpoint.region,
                has_session_token = session_token.is_some(),
                "Sending attempt"
            );

            let call = self.deps.executor.execute(&endpoint, &request, session_token.as_deref());
            let result = match guarded(&cancel, deadline, call).await {
                Ok(result) => result,
                Err(interruption) => {
                    warn!(
                        attempt,
                        endpoint = %endpoint.url,
                        ?interruption,
                        "Operation interrupted"
                    );
                    return Err(ctx.interrupted(interruption));
                }
            };

            let error = match result {
                Ok(response) => {
                    self.on_success(&request, breaker_ranges, &endpoint, &response);
                    ctx.record_success(endpoint.clone());
                    debug!(
                        attempt,
                        retries = ctx.retry_count(),
                        elapsed_ms = ctx.elapsed().as_millis() as u64,
                        "Operation succeeded"
                    );
                    return Ok(OperationOutcome {
                        operation_id,
                        response,
                        endpoint,
                        retry_count: ctx.retry_count(),
                        attempts: ctx.into_attempts(),
                    });
                }
                Err(error) => error,
            };

            self.on_failure(&request, breaker_ranges, &endpoint, &error);
            ctx.record_failure(endpoint.clone(), error.clone());

            let decision = self.policy.decide(&error, &mut ctx);
            debug!(
                attempt,
                endpoint = %endpoint.url,
                error = error.label(),
                decision = ?decision,
                "Attempt failed"
            );

            match decision {
                RetryDecision::NextCandidate { delay, wrap } => {
                    if !cursor.advance() {
                        if !wrap {
                            let reason = match error {
                                ClassifiedError::ResponseTimeout => {
                                    ExhaustionReason::TimeoutRetries
                                }
                                _ => ExhaustionReason::CandidatesExhausted,
                            };
                            return Err(ctx.exhausted(reason));
                        }
                        let topology = self.deps.topology.current();
                        let consistency = self.effective_consistency(&request, &topology);
                        cursor.reset(self.candidates(&topology, &request, consistency));
                    }
                    if let Err(interruption) = pause(&ctx, &cancel, delay).await {
                        return Err(ctx.interrupted(interruption));
                    }
                }

                RetryDecision::SameEndpoint { delay } => {
                    if let Err(interruption) = pause(&ctx, &cancel, delay).await {
                        return Err(ctx.interrupted(interruption));
                    }
                    cursor.pinned = Some(endpoint);
                }

                RetryDecision::SessionFallback => {
                    let fallback = self.session_fallback(&request, &endpoint);
                    info!(
                        from = %endpoint.region,
                        to = %fallback.region,
                        "Falling back to region holding the session token"
                    );
                    cursor.pinned = Some(fallback);
                }

                RetryDecision::RefreshRouting => {
                    let refresh = self.deps.executor.refresh_routing(request.partition());
                    if let Err(interruption) = guarded(&cancel, deadline, refresh).await {
                        return Err(ctx.interrupted(interruption));
                    }
                    cursor.pinned = Some(endpoint);
                }

                RetryDecision::RefreshTopology => {
                    let refresh = self.deps.topology.refresh();
                    let refreshed = match guarded(&cancel, deadline, refresh).await {
                        Ok(refreshed) => refreshed,
                        Err(interruption) => return Err(ctx.interrupted(interruption)),
                    };
                    match refreshed {
                        Ok(topology) => {
                            let primary = topology.primary_write_endpoint();
                            info!(
                                region = %primary.region,
                                version = topology.version(),
                                "Retrying write on refreshed primary"
                            );
                            let consistency = self.effective_consistency(&request, &topology);
                            cursor.reset(self.candidates(&topology, &request, consistency));
                            cursor.pinned = Some(primary);
                        }
                        Err(e) => {
                            warn!(error = %e, "Topology refresh after forbidden write failed");
                            return Err(ctx.escalated(error));
                        }
                    }
                }

                RetryDecision::Fail(Terminal::Application { status_code, sub_status }) => {
                    return Err(ctx.application(status_code, sub_status, endpoint));
                }
                RetryDecision::Fail(Terminal::Exhausted(reason)) => {
                    info!(%reason, attempts = ctx.executor_calls(), "Retry budget exhausted");
                    return Err(ctx.exhausted(reason));
                }
                RetryDecision::Fail(Terminal::Escalate) => {
                    warn!(
                        attempts = ctx.executor_calls(),
                        "Write still forbidden after topology refresh"
                    );
                    return Err(ctx.escalated(error));
                }
            }
        }
    }

    fn candidates(
        &self,
        topology: &TopologySnapshot,
        request: &OperationRequest,
        consistency: ConsistencyLevel,
    ) -> Vec<Endpoint> {
        let query = CandidateQuery::for_request(request, consistency);
        self.deps.selector.candidates_for(topology, &query)
    }

    /// Ranges whose circuits gate this request and are charged with its
    /// outcome
    ///
    /// Single-write writes have exactly one possible target and bypass the
    /// breaker entirely.
    fn breaker_ranges<'r>(&self, request: &'r OperationRequest, multi_write: bool) -> &'r [String] {
        if request.kind.is_write() && !multi_write {
            return &[];
        }
        request.circuit_ranges()
    }

    fn on_success(
        &self,
        request: &OperationRequest,
        ranges: &[String],
        endpoint: &Endpoint,
        response: &ExecutorResponse,
    ) {
        self.deps.health.record_success(endpoint);
        for range in ranges {
            self.deps.breaker.on_result(range, &endpoint.region, true);
        }
        if request.kind == OperationKind::Write {
            self.write_failure_streak.store(0, Ordering::Relaxed);
        }
        if let Some(header) = response.session_token.as_deref() {
            if let Err(e) = self.deps.sessions.merge_response(header, &endpoint.region) {
                warn!(error = %e, region = %endpoint.region, "Ignoring malformed session token");
            }
        }
    }

    fn on_failure(
        &self,
        request: &OperationRequest,
        ranges: &[String],
        endpoint: &Endpoint,
        error: &ClassifiedError,
    ) {
        self.deps.health.record_failure(endpoint, error);
        let success = !error.counts_as_partition_failure();
        for range in ranges {
            self.deps.breaker.on_result(range, &endpoint.region, success);
        }

        let write_outage = request.kind == OperationKind::Write
            && matches!(
                error,
                ClassifiedError::ConnectionFailure(_) | ClassifiedError::ResponseTimeout
            );
        if write_outage {
            let streak = self.write_failure_streak.fetch_add(1, Ordering::Relaxed) + 1;
            if streak >= self.write_failures_before_refresh {
                self.write_failure_streak.store(0, Ordering::Relaxed);
                info!(streak, "Consecutive write failures; refreshing topology in background");
                self.deps.topology.refresh_in_background();
            }
        }
    }

    /// Region for the one session fallback attempt
    ///
    /// Prefers a read region whose observed progress covers the token held
    /// for the request's first range, other than the one that just failed.
    /// Falls back to the primary write region.
    fn session_fallback(&self, request: &OperationRequest, failed: &Endpoint) -> Endpoint {
        let topology = self.deps.topology.current();
        let satisfying = request.partition_ranges.first().and_then(|range| {
            let required = self.deps.sessions.get(range)?;
            let regions = self.deps.sessions.regions_satisfying(range, &required);
            regions
                .iter()
                .filter_map(|name| topology.region(name))
                .find(|region| region.is_available_for_read && !region.is_named(&failed.region))
                .map(|region| region.read())
        });
        satisfying.unwrap_or_else(|| topology.primary_write_endpoint())
    }
}

/// Race `future` against cancellation and the deadline
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    deadline: Instant,
    future: F,
) -> Result<F::Output, Interruption> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interruption::Cancelled),
        _ = tokio::time::sleep_until(deadline) => Err(Interruption::DeadlineExceeded),
        output = future => Ok(output),
    }
}

/// Wait `delay` before the next attempt
///
/// A delay that would pass the deadline fails immediately instead of
/// sleeping first.
async fn pause(
    ctx: &RetryContext,
    cancel: &CancellationToken,
    delay: Duration,
) -> Result<(), Interruption> {
    if cancel.is_cancelled() {
        return Err(Interruption::Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }
    if ctx.would_overrun(delay) {
        return Err(Interruption::DeadlineExceeded);
    }
    guarded(cancel, ctx.deadline(), tokio::time::sleep(delay)).await
}
