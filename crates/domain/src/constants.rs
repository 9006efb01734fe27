//! Routing constants
//!
//! Default values for every tunable in [`crate::config::ClientConfig`], plus
//! the wire-level status codes the classifier recognises.

// Topology
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_INITIAL_REFRESH_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_REFRESH_BACKOFF_MS: u64 = 500;
pub const DEFAULT_WRITE_FAILURES_BEFORE_REFRESH: u32 = 3;
pub const DEFAULT_METADATA_REQUEST_TIMEOUT_MS: u64 = 10_000;

// Health tracking
pub const DEFAULT_SUSPECT_AFTER_FAILURES: u32 = 3;
pub const DEFAULT_UNHEALTHY_AFTER_FAILURES: u32 = 2;
pub const DEFAULT_SUSPECT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

// Partition circuit breaker
pub const DEFAULT_CONSECUTIVE_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_FAILURE_RATE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_MINIMUM_REQUESTS: u32 = 10;
pub const DEFAULT_BREAKER_WINDOW_SECS: u64 = 60;
pub const DEFAULT_BREAKER_COOLDOWN_SECS: u64 = 30;
pub const BREAKER_WINDOW_CAPACITY: usize = 1_000;

// Retry
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MAX_CONNECTION_RETRIES: u32 = 3;
pub const DEFAULT_WRITE_TIMEOUT_RETRIES: u32 = 2;
pub const DEFAULT_WRITE_BACKOFF_BASE_MS: u64 = 100;
pub const DEFAULT_WRITE_BACKOFF_MAX_MS: u64 = 2_000;
pub const DEFAULT_THROTTLE_DELAY_MS: u64 = 100;
pub const DEFAULT_SESSION_RETRIES: u32 = 2;
pub const DEFAULT_SESSION_RETRY_DELAY_MS: u64 = 10;
pub const DEFAULT_STALE_ROUTING_RETRIES: u32 = 1;

// Status codes
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_REQUEST_TIMEOUT: u16 = 408;
pub const STATUS_GONE: u16 = 410;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

// Sub-status codes
pub const SUB_STATUS_WRITE_FORBIDDEN: u32 = 3;
pub const SUB_STATUS_READ_SESSION_NOT_AVAILABLE: u32 = 1002;
pub const SUB_STATUS_PARTITION_KEY_RANGE_GONE: u32 = 1002;
pub const SUB_STATUS_COMPLETING_SPLIT: u32 = 1007;
pub const SUB_STATUS_COMPLETING_PARTITION_MIGRATION: u32 = 1008;

// Session token wire format
pub const SESSION_TOKEN_RANGE_SEPARATOR: char = ':';
pub const SESSION_TOKEN_PART_SEPARATOR: char = '#';
pub const SESSION_TOKEN_REGION_SEPARATOR: char = '=';
pub const COMPOUND_TOKEN_SEPARATOR: char = ',';
