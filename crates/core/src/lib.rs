//! # Polaris Core
//!
//! Multi-region routing and resiliency logic - no network code.
//!
//! This crate contains:
//! - Port interfaces for the request executor, account metadata reader and
//!   endpoint prober
//! - Topology store, endpoint health tracker and partition circuit breaker
//! - Session token store
//! - Location selection and retry orchestration
//! - The async [`RoutingClient`] and its blocking facade
//!
//! ## Architecture Principles
//! - Only depends on `polaris-common` and `polaris-domain`
//! - No HTTP or platform code; all I/O goes through the ports
//! - Shared state is per-key sharded; no lock is held across an await

pub mod circuit;
pub mod client;
pub mod error;
pub mod health;
pub mod ports;
pub mod request;
pub mod retry;
pub mod routing;
pub mod session;
pub mod topology;

pub use circuit::{CircuitSnapshot, PartitionCircuitBreaker};
pub use client::{BlockingRoutingClient, RoutingClient, RoutingClientBuilder};
pub use error::{AttemptOutcome, AttemptRecord, ExhaustionReason, OperationError};
pub use health::{EndpointHealthRecord, HealthTracker};
pub use ports::{AccountMetadataReader, EndpointProber, RequestExecutor};
pub use request::{OperationOutcome, OperationRequest};
pub use retry::{RetryOrchestrator, RetryPolicy};
pub use routing::{CandidateQuery, LocationSelector};
pub use session::{CompoundSessionToken, SessionTokenError, SessionTokenStore, VectorSessionToken};
pub use topology::TopologyStore;
