//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{topology_error, InfraError};
