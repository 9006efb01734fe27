//! Domain types for multi-region routing

pub mod account;
pub mod classified;
pub mod health;
pub mod operation;
pub mod topology;

pub use account::{AccountLocation, AccountProperties, ConsistencyPolicy};
pub use classified::{ClassifiedError, FailureSignals};
pub use health::HealthState;
pub use operation::{ConsistencyLevel, ExecutorResponse, OperationKind};
pub use topology::{Endpoint, Region, TopologySnapshot};
