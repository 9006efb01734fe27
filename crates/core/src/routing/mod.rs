//! Endpoint selection for logical operations

pub mod selector;

pub use selector::{CandidateQuery, LocationSelector};
