//! Periodic background worker with explicit lifecycle
//!
//! A [`PeriodicWorker`] runs an async tick function on a fixed interval
//! until it is stopped. Each worker owns its own [`CancellationToken`]
//! and join handle, so shutdown is explicit and bounded:
//!
//! - spawned via Tokio with the join handle retained
//! - stopped via [`PeriodicWorker::stop`], which cancels and then awaits
//!   the task for at most [`SHUTDOWN_TIMEOUT`]
//! - an in-flight tick is dropped at its next await point on cancellation

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{CommonError, CommonResult};

/// Upper bound on how long `stop()` waits for the worker task to finish
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Background task that invokes a tick function every `interval`
#[derive(Debug)]
pub struct PeriodicWorker {
    name: &'static str,
    interval: Duration,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl PeriodicWorker {
    /// Spawn a worker that calls `tick` every `interval`
    ///
    /// The first tick fires after one full interval, not immediately. Missed
    /// ticks are delayed rather than bursted.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with_token(name, interval, CancellationToken::new(), tick)
    }

    /// Spawn a worker whose cancellation is a child of `parent`
    ///
    /// Cancelling `parent` stops this worker as well, which lets an owner
    /// shut down several workers with one signal.
    pub fn spawn_child<F, Fut>(
        name: &'static str,
        interval: Duration,
        parent: &CancellationToken,
        tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with_token(name, interval, parent.child_token(), tick)
    }

    fn spawn_with_token<F, Fut>(
        name: &'static str,
        interval: Duration,
        cancellation: CancellationToken,
        tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let cancel = cancellation.clone();

        info!(worker = name, interval_ms = interval.as_millis() as u64, "Starting periodic worker");

        let handle = tokio::spawn(async move {
            run_periodic(name, interval, cancel, tick).await;
        });

        Self { name, interval, cancellation, task_handle: Some(handle) }
    }

    /// Worker name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Tick interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the worker is currently running
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
            && !self.cancellation.is_cancelled()
    }

    /// Signal the worker to stop without waiting for it
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Stop the worker and wait for the task to complete
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::Timeout`] when the task does not finish within
    /// [`SHUTDOWN_TIMEOUT`], and [`CommonError::TaskCancelled`] when the
    /// task panicked.
    pub async fn stop(&mut self) -> CommonResult<()> {
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(SHUTDOWN_TIMEOUT, handle)
                .await
                .map_err(|_| CommonError::timeout(self.name, SHUTDOWN_TIMEOUT))?
                .map_err(|e| CommonError::task_cancelled_with_reason(self.name, e.to_string()))?;
        }

        info!(worker = self.name, "Periodic worker stopped");
        Ok(())
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

async fn run_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    cancel: CancellationToken,
    mut tick: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(worker = name, "Periodic worker shutting down");
                break;
            }
            _ = ticker.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick() => {}
                }
            }
        }
    }
}
