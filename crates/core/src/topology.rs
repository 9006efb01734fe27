//! Topology store
//!
//! Holds the last good [`TopologySnapshot`] and replaces it wholesale on a
//! successful refresh. The snapshot is published through a single-slot
//! `watch` channel: readers clone an `Arc` and never wait on a refresh.
//!
//! Concurrent refreshes are coalesced. The first caller installs a shared
//! in-flight future; overlapping callers await the same future and receive
//! the same result, success or error. A failed refresh leaves the previous
//! snapshot published.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use polaris_common::resilience::{BackoffStrategy, Jitter};
use polaris_domain::{TopologyConfig, TopologyError, TopologySnapshot};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::ports::AccountMetadataReader;

type RefreshResult = Result<Arc<TopologySnapshot>, TopologyError>;
type InFlightRefresh = Shared<BoxFuture<'static, RefreshResult>>;

const MAX_BOOTSTRAP_BACKOFF: Duration = Duration::from_secs(10);

struct Publisher {
    reader: Arc<dyn AccountMetadataReader>,
    sender: watch::Sender<Arc<TopologySnapshot>>,
    next_version: AtomicU64,
    request_timeout: Duration,
}

impl Publisher {
    async fn fetch_and_publish(self: Arc<Self>) -> RefreshResult {
        let snapshot = fetch_snapshot(self.reader.as_ref(), self.request_timeout).await?;
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(snapshot.with_version(version));

        let previous = self.sender.send_replace(Arc::clone(&snapshot));
        if previous.primary_write_region().name != snapshot.primary_write_region().name {
            info!(
                previous_primary = %previous.primary_write_region().name,
                primary = %snapshot.primary_write_region().name,
                version,
                "Primary write region changed"
            );
        }
        info!(
            version,
            regions = snapshot.regions().len(),
            multi_write = snapshot.enable_multiple_write_locations(),
            "Published topology snapshot"
        );
        Ok(snapshot)
    }
}

async fn fetch_snapshot(
    reader: &dyn AccountMetadataReader,
    request_timeout: Duration,
) -> Result<TopologySnapshot, TopologyError> {
    let properties = tokio::time::timeout(request_timeout, reader.read_account())
        .await
        .map_err(|_| TopologyError::Timeout(request_timeout.as_millis() as u64))??;
    properties.to_snapshot()
}

/// Owner of the published topology snapshot
pub struct TopologyStore {
    publisher: Arc<Publisher>,
    in_flight: Mutex<Option<InFlightRefresh>>,
}

impl std::fmt::Debug for TopologyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyStore").field("version", &self.current().version()).finish()
    }
}

impl TopologyStore {
    /// Perform the initial refresh and build the store
    ///
    /// Retries up to `initial_refresh_attempts` times with exponential
    /// backoff. A document without a write region counts as a failed
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns the last [`TopologyError`] when no attempt succeeded.
    #[instrument(skip_all, fields(attempts = config.initial_refresh_attempts))]
    pub async fn bootstrap(
        reader: Arc<dyn AccountMetadataReader>,
        config: &TopologyConfig,
    ) -> Result<Self, TopologyError> {
        let backoff =
            BackoffStrategy::exponential(config.initial_refresh_backoff(), MAX_BOOTSTRAP_BACKOFF);
        let attempts = config.initial_refresh_attempts.max(1);
        let request_timeout = config.metadata_request_timeout();

        let mut last_error = TopologyError::Unavailable("no refresh attempted".to_string());
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = Jitter::Equal.apply(backoff.calculate_delay(attempt - 1));
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying initial topology refresh"
                );
                tokio::time::sleep(delay).await;
            }

            match fetch_snapshot(reader.as_ref(), request_timeout).await {
                Ok(snapshot) => {
                    let snapshot = Arc::new(snapshot.with_version(1));
                    info!(
                        regions = snapshot.regions().len(),
                        primary = %snapshot.primary_write_region().name,
                        "Initial topology loaded"
                    );
                    let (sender, _) = watch::channel(snapshot);
                    let publisher = Arc::new(Publisher {
                        reader,
                        sender,
                        next_version: AtomicU64::new(2),
                        request_timeout,
                    });
                    return Ok(Self { publisher, in_flight: Mutex::new(None) });
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Initial topology refresh failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Last published snapshot; never blocks
    pub fn current(&self) -> Arc<TopologySnapshot> {
        Arc::clone(&self.publisher.sender.borrow())
    }

    /// Receiver that observes every publication
    pub fn subscribe(&self) -> watch::Receiver<Arc<TopologySnapshot>> {
        self.publisher.sender.subscribe()
    }

    /// Fetch account metadata and publish a new snapshot
    ///
    /// Overlapping callers share one in-flight fetch.
    ///
    /// # Errors
    ///
    /// Returns the refresh error; the previous snapshot stays published.
    pub async fn refresh(&self) -> RefreshResult {
        let in_flight = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(shared) if shared.peek().is_none() => shared.clone(),
                _ => {
                    let shared = Arc::clone(&self.publisher).fetch_and_publish().boxed().shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        let result = in_flight.await;
        if let Err(e) = &result {
            warn!(
                error = %e,
                version = self.current().version(),
                "Topology refresh failed; keeping current snapshot"
            );
        }
        result
    }

    /// Start a refresh without waiting for it
    pub fn refresh_in_background(self: &Arc<Self>) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let _ = store.refresh().await;
        });
    }
}
