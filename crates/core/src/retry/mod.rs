//! Retry orchestration for logical operations
//!
//! - **[`context`]**: per-operation attempt chain and counters
//! - **[`policy`]**: failure classification to next-step decision
//! - **[`orchestrator`]**: the attempt loop

pub mod context;
pub mod orchestrator;
pub mod policy;

pub use context::{Interruption, RetryContext, RetryCounters};
pub use orchestrator::{RetryDependencies, RetryOrchestrator};
pub use policy::{RetryDecision, RetryPolicy, Terminal};
