//! Routing client
//!
//! [`RoutingClient`] wires the routing components together, owns the
//! background workers (topology refresh and endpoint probing) and exposes
//! the operation entry point plus read-only introspection of routing state.
//!
//! [`BlockingRoutingClient`] wraps it for synchronous callers with an owned
//! multi-thread runtime.

use std::sync::Arc;

use parking_lot::Mutex;
use polaris_common::resilience::{Clock, SystemClock};
use polaris_common::{CommonResult, PeriodicWorker};
use polaris_domain::{ClientConfig, PolarisError, TopologyError, TopologySnapshot};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::circuit::{CircuitSnapshot, PartitionCircuitBreaker};
use crate::error::OperationError;
use crate::health::{EndpointHealthRecord, HealthTracker};
use crate::ports::{AccountMetadataReader, EndpointProber, RequestExecutor};
use crate::request::{OperationOutcome, OperationRequest};
use crate::retry::{RetryDependencies, RetryOrchestrator, RetryPolicy};
use crate::routing::LocationSelector;
use crate::session::{SessionTokenStore, VectorSessionToken};
use crate::topology::TopologyStore;

const TOPOLOGY_WORKER: &str = "topology-refresh";
const PROBE_WORKER: &str = "endpoint-probe";

/// Builder for [`RoutingClient`]
///
/// The executor, metadata reader and prober are required.
pub struct RoutingClientBuilder {
    config: ClientConfig,
    executor: Option<Arc<dyn RequestExecutor>>,
    metadata_reader: Option<Arc<dyn AccountMetadataReader>>,
    prober: Option<Arc<dyn EndpointProber>>,
    clock: Arc<dyn Clock>,
}

impl RoutingClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            executor: None,
            metadata_reader: None,
            prober: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn executor(mut self, executor: Arc<dyn RequestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn metadata_reader(mut self, reader: Arc<dyn AccountMetadataReader>) -> Self {
        self.metadata_reader = Some(reader);
        self
    }

    pub fn prober(mut self, prober: Arc<dyn EndpointProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Clock for health windows and circuit cooldowns
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate configuration, load the initial topology and start the
    /// background workers
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`PolarisError::Config`] for invalid configuration or a missing
    ///   collaborator
    /// - [`PolarisError::Topology`] when no initial refresh succeeded
    #[instrument(skip_all, fields(account = %self.config.account_endpoint))]
    pub async fn build(self) -> Result<RoutingClient, PolarisError> {
        self.config.validate()?;
        let executor = self.executor.ok_or_else(|| missing("request executor"))?;
        let reader = self.metadata_reader.ok_or_else(|| missing("account metadata reader"))?;
        let prober = self.prober.ok_or_else(|| missing("endpoint prober"))?;
        let config = self.config;

        let topology = Arc::new(TopologyStore::bootstrap(reader, &config.topology).await?);
        let health = Arc::new(HealthTracker::with_clock(
            config.health.clone(),
            prober,
            Arc::clone(&self.clock),
        ));
        let breaker = Arc::new(PartitionCircuitBreaker::with_clock(
            config.circuit_breaker.clone(),
            Arc::clone(&self.clock),
        ));
        let sessions = Arc::new(SessionTokenStore::new());
        let selector = LocationSelector::new(&config, Arc::clone(&health), Arc::clone(&breaker));

        let orchestrator = RetryOrchestrator::new(
            RetryDependencies {
                executor,
                topology: Arc::clone(&topology),
                selector,
                health: Arc::clone(&health),
                breaker: Arc::clone(&breaker),
                sessions: Arc::clone(&sessions),
            },
            RetryPolicy::new(config.retry.clone()),
            config.consistency.default_override,
            config.topology.write_failures_before_refresh,
        );

        let shutdown = CancellationToken::new();
        let workers = spawn_workers(&config, &shutdown, &topology, &health);

        info!(
            regions = topology.current().regions().len(),
            workers = workers.len(),
            "Routing client started"
        );

        Ok(RoutingClient {
            inner: Arc::new(ClientInner {
                config,
                topology,
                health,
                breaker,
                sessions,
                orchestrator,
                shutdown,
                workers: Mutex::new(workers),
            }),
        })
    }
}

fn missing(what: &str) -> PolarisError {
    PolarisError::Config(format!("{what} is required"))
}

fn spawn_workers(
    config: &ClientConfig,
    shutdown: &CancellationToken,
    topology: &Arc<TopologyStore>,
    health: &Arc<HealthTracker>,
) -> Vec<PeriodicWorker> {
    let mut workers = Vec::with_capacity(2);

    let store = Arc::clone(topology);
    workers.push(PeriodicWorker::spawn_child(
        TOPOLOGY_WORKER,
        config.topology.refresh_interval(),
        shutdown,
        move || {
            let store = Arc::clone(&store);
            async move {
                // Failures are logged by the store; the previous snapshot stays
                let _ = store.refresh().await;
            }
        },
    ));

    if config.health.background_probing {
        let store = Arc::clone(topology);
        let tracker = Arc::clone(health);
        workers.push(PeriodicWorker::spawn_child(
            PROBE_WORKER,
            config.health.probe_interval(),
            shutdown,
            move || {
                let store = Arc::clone(&store);
                let tracker = Arc::clone(&tracker);
                async move {
                    let endpoints = store.current().endpoints();
                    tracker.probe_all(&endpoints).await;
                }
            },
        ));
    }

    workers
}

struct ClientInner {
    config: ClientConfig,
    topology: Arc<TopologyStore>,
    health: Arc<HealthTracker>,
    breaker: Arc<PartitionCircuitBreaker>,
    sessions: Arc<SessionTokenStore>,
    orchestrator: RetryOrchestrator,
    shutdown: CancellationToken,
    workers: Mutex<Vec<PeriodicWorker>>,
}

/// Multi-region routing client
///
/// Cheap to clone; clones share all routing state.
#[derive(Clone)]
pub struct RoutingClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for RoutingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingClient")
            .field("account", &self.inner.config.account_endpoint)
            .field("topology_version", &self.inner.topology.current().version())
            .field("shut_down", &self.inner.shutdown.is_cancelled())
            .finish()
    }
}

impl RoutingClient {
    pub fn builder(config: ClientConfig) -> RoutingClientBuilder {
        RoutingClientBuilder::new(config)
    }

    /// Route and retry one logical operation
    ///
    /// # Errors
    ///
    /// See [`OperationError`]. After [`shutdown`](Self::shutdown) every call
    /// fails with [`TopologyError::Shutdown`].
    pub async fn perform_operation(
        &self,
        request: OperationRequest,
    ) -> Result<OperationOutcome, OperationError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(TopologyError::Shutdown.into());
        }
        self.inner.orchestrator.execute(request).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn current_topology(&self) -> Arc<TopologySnapshot> {
        self.inner.topology.current()
    }

    pub fn subscribe_topology(&self) -> watch::Receiver<Arc<TopologySnapshot>> {
        self.inner.topology.subscribe()
    }

    pub fn endpoint_health(&self) -> Vec<EndpointHealthRecord> {
        self.inner.health.snapshot()
    }

    pub fn circuit_states(&self) -> Vec<CircuitSnapshot> {
        self.inner.breaker.snapshot()
    }

    pub fn session_token(&self, range: &str) -> Option<VectorSessionToken> {
        self.inner.sessions.get(range)
    }

    /// Refresh the topology now, sharing any refresh already in flight
    ///
    /// # Errors
    ///
    /// Returns the refresh error; the previous snapshot stays published.
    pub async fn refresh_account_metadata(&self) -> Result<Arc<TopologySnapshot>, TopologyError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(TopologyError::Shutdown);
        }
        self.inner.topology.refresh().await
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stop background workers
    ///
    /// Idempotent. Each worker gets the common shutdown timeout to finish.
    ///
    /// # Errors
    ///
    /// Returns the first worker stop failure; remaining workers are still
    /// stopped.
    pub async fn shutdown(&self) -> CommonResult<()> {
        self.inner.shutdown.cancel();
        let mut workers = std::mem::take(&mut *self.inner.workers.lock());

        let mut first_error = None;
        for worker in &mut workers {
            if let Err(e) = worker.stop().await {
                warn!(worker = worker.name(), error = %e, "Worker did not stop cleanly");
                first_error.get_or_insert(e);
            }
        }
        if !workers.is_empty() {
            info!(workers = workers.len(), "Routing client shut down");
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Synchronous facade over [`RoutingClient`]
///
/// Owns a multi-thread runtime; do not use from inside another runtime.
pub struct BlockingRoutingClient {
    client: RoutingClient,
    runtime: tokio::runtime::Runtime,
}

impl std::fmt::Debug for BlockingRoutingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingRoutingClient").field("client", &self.client).finish()
    }
}

impl BlockingRoutingClient {
    /// Start a runtime and build the client on it
    ///
    /// # Errors
    ///
    /// [`PolarisError::Internal`] when the runtime cannot start, otherwise
    /// whatever [`RoutingClientBuilder::build`] returns.
    pub fn new(builder: RoutingClientBuilder) -> Result<Self, PolarisError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("polaris-routing")
            .build()
            .map_err(|e| PolarisError::Internal(format!("failed to start runtime: {e}")))?;
        let client = runtime.block_on(builder.build())?;
        Ok(Self { client, runtime })
    }

    pub fn perform_operation(
        &self,
        request: OperationRequest,
    ) -> Result<OperationOutcome, OperationError> {
        self.runtime.block_on(self.client.perform_operation(request))
    }

    pub fn refresh_account_metadata(&self) -> Result<Arc<TopologySnapshot>, TopologyError> {
        self.runtime.block_on(self.client.refresh_account_metadata())
    }

    pub fn current_topology(&self) -> Arc<TopologySnapshot> {
        self.client.current_topology()
    }

    pub fn endpoint_health(&self) -> Vec<EndpointHealthRecord> {
        self.client.endpoint_health()
    }

    pub fn circuit_states(&self) -> Vec<CircuitSnapshot> {
        self.client.circuit_states()
    }

    pub fn session_token(&self, range: &str) -> Option<VectorSessionToken> {
        self.client.session_token(range)
    }

    /// The async client driven by this facade
    pub fn inner(&self) -> &RoutingClient {
        &self.client
    }

    /// Stop background workers and the runtime
    ///
    /// # Errors
    ///
    /// Returns the first worker stop failure.
    pub fn shutdown(self) -> CommonResult<()> {
        let result = self.runtime.block_on(self.client.shutdown());
        drop(self.client);
        self.runtime.shutdown_timeout(polaris_common::lifecycle::SHUTDOWN_TIMEOUT);
        result
    }
}
