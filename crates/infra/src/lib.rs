//! # Polaris Infrastructure
//!
//! Infrastructure implementations of the routing core ports.
//!
//! This crate contains:
//! - Configuration loading (environment, TOML and JSON files)
//! - HTTP account metadata reader and endpoint prober (reqwest)
//! - Classification of HTTP responses and transport errors
//! - Tracing subscriber initialisation
//!
//! ## Architecture
//! - Implements traits defined in `polaris-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpAccountMetadataReader, HttpClient, HttpEndpointProber};
pub use observability::{init_tracing, LogFormat};
