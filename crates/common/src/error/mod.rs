//! Shared error types and classification for Polaris crates
//!
//! The routing core reacts to failures very differently depending on their
//! class, so every error type in the workspace reports its characteristics
//! through [`ErrorClassification`]:
//!
//! - **`is_retryable()`**: may the same logical operation be attempted again?
//! - **`severity()`**: how loudly should the failure be logged?
//! - **`is_critical()`**: does the failure indicate a broken invariant?
//! - **`retry_after()`**: server- or policy-suggested delay, if any.
//!
//! ## Severity levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Resource not found, cancelled operation |
//! | **Warning** | Degraded but operational | Throttling, timeouts, stale topology |
//! | **Error** | Failure requiring attention | Exhausted retries, invalid config |
//! | **Critical** | Invariant violated | Internal errors |

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised by the shared lifecycle primitives
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommonError {
    /// Operation exceeded its deadline
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// Background task was cancelled or panicked
    #[error("Task '{task_id}' cancelled: {reason}")]
    TaskCancelled { task_id: String, reason: String },
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::TaskCancelled { .. } => ErrorSeverity::Info,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a task cancellation error with a reason
    pub fn task_cancelled_with_reason<S: Into<String>, R: Into<String>>(
        task_id: S,
        reason: R,
    ) -> Self {
        Self::TaskCancelled { task_id: task_id.into(), reason: reason.into() }
    }
}

/// Standard interface for classifying errors
///
/// Implemented by every error type that crosses a module boundary so retry
/// logic and logging can treat them uniformly.
pub trait ErrorClassification {
    /// Check if this error is retryable
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when a specific delay is known (for example a
    /// server-provided throttling delay).
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
