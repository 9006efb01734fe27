//! Resilience building blocks shared by the routing core
//!
//! - [`clock`]: monotonic time source with a controllable mock
//! - [`backoff`]: delay calculation for same-target retries
//! - [`window`]: sliding outcome window for failure-rate decisions
//! - [`CircuitState`]: the three circuit breaker states

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod backoff;
pub mod clock;
pub mod window;

pub use backoff::{BackoffStrategy, Jitter};
pub use clock::{Clock, MockClock, SystemClock};
pub use window::OutcomeWindow;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, admitting a single probe request
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}
