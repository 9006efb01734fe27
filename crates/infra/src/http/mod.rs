//! HTTP adapters for the routing core ports

pub mod classify;
pub mod client;
pub mod metadata;
pub mod prober;

pub use classify::{
    classify_response, classify_transport_error, session_token, signals_from_status,
    RETRY_AFTER_MS_HEADER, SESSION_TOKEN_HEADER, SUB_STATUS_HEADER,
};
pub use client::{HttpClient, HttpClientBuilder};
pub use metadata::HttpAccountMetadataReader;
pub use prober::HttpEndpointProber;
