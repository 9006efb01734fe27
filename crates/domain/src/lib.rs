//! # Polaris Domain
//!
//! Domain types for multi-region request routing.
//!
//! This crate contains:
//! - Topology types (Region, Endpoint, TopologySnapshot) and the account
//!   metadata document they are built from
//! - The closed failure taxonomy (ClassifiedError) and its status-code
//!   classification
//! - Client configuration with defaults and validation
//! - Domain error types and constants
//!
//! ## Architecture
//! - No dependencies on other Polaris crates
//! - Only external dependencies allowed

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
