//! Lifecycle management for background tasks
//!
//! - **[`worker`]**: periodic worker with cancellation and bounded shutdown

pub mod worker;

pub use worker::{PeriodicWorker, SHUTDOWN_TIMEOUT};
