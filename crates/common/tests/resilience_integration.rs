//! Integration tests for resilience and lifecycle primitives
//!
//! Exercises the clock, backoff, and outcome window together the way the
//! routing core combines them, plus periodic worker shutdown.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use polaris_common::resilience::{BackoffStrategy, Clock, Jitter, MockClock, OutcomeWindow};
use polaris_common::{CommonError, ErrorClassification, PeriodicWorker};

/// Validates a failure-rate window driven by a mock clock.
///
/// This mirrors how partition circuits decide to open: outcomes are
/// recorded with the clock's current instant and the rate is read back
/// later, after old outcomes have aged out.
///
/// # Test Steps
/// 1. Record 6 failures and 4 successes at t=0
/// 2. Verify the 60% failure rate at t=0
/// 3. Advance 30s, record 2 successes
/// 4. Advance another 40s so the t=0 outcomes leave the 60s window
/// 5. Verify only the 2 recent successes remain
#[test]
fn test_outcome_window_with_mock_clock() {
    let clock = MockClock::new();
    let mut window = OutcomeWindow::new(Duration::from_secs(60), 100);

    for i in 0..10 {
        window.record(clock.now(), i >= 6);
    }
    assert_eq!(window.total(clock.now()), 10);
    assert!((window.failure_rate(clock.now()) - 0.6).abs() < 1e-9);

    clock.advance(Duration::from_secs(30));
    window.record(clock.now(), true);
    window.record(clock.now(), true);

    clock.advance(Duration::from_secs(40));
    assert_eq!(window.total(clock.now()), 2);
    assert_eq!(window.failure_rate(clock.now()), 0.0);
}

/// Validates that jittered exponential backoff stays within its cap.
///
/// # Test Steps
/// 1. Build exponential backoff 50ms..400ms
/// 2. Apply equal jitter to every attempt 0..10
/// 3. Verify each delay is at least half the raw delay and at most the cap
#[test]
fn test_jittered_backoff_respects_cap() {
    let strategy =
        BackoffStrategy::exponential(Duration::from_millis(50), Duration::from_millis(400));

    for attempt in 0..10 {
        let raw = strategy.calculate_delay(attempt);
        let jittered = Jitter::Equal.apply(raw);
        assert!(jittered <= Duration::from_millis(400));
        assert!(jittered >= raw / 2);
    }
}

/// Validates periodic worker ticking under paused time and clean shutdown.
///
/// # Test Steps
/// 1. Spawn a worker with a 5 minute interval
/// 2. Advance 16 minutes of paused time
/// 3. Verify 3 ticks ran
/// 4. Stop the worker and verify it reports not running
#[tokio::test(start_paused = true)]
async fn test_periodic_worker_lifecycle() {
    let ticks = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&ticks);

    let mut worker = PeriodicWorker::spawn("refresh", Duration::from_secs(300), move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    tokio::time::sleep(Duration::from_secs(16 * 60)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
    assert_eq!(worker.name(), "refresh");

    worker.stop().await.expect("worker should stop");
    assert!(!worker.is_running());
}

/// Validates that shutdown errors classify as expected.
#[test]
fn test_shutdown_error_classification() {
    let timeout = CommonError::timeout("refresh", Duration::from_secs(5));
    assert!(timeout.is_retryable());

    let cancelled = CommonError::task_cancelled_with_reason("refresh", "panicked");
    assert!(!cancelled.is_retryable());
}
