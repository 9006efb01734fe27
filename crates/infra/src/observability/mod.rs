//! Tracing subscriber initialisation
//!
//! The routing crates only emit `tracing` events; applications decide where
//! they go. [`init_tracing`] installs a global subscriber with an
//! environment-driven filter and either human-readable or JSON output.
//!
//! ```rust,no_run
//! use polaris_infra::observability::{init_tracing, LogFormat};
//!
//! init_tracing(LogFormat::Json).expect("tracing already initialised");
//! tracing::info!("routing client starting");
//! ```

use std::str::FromStr;

use polaris_domain::PolarisError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives, e.g. `polaris_core=debug,info`
pub const LOG_FILTER_ENV: &str = "POLARIS_LOG";
/// `plain` or `json`
pub const LOG_FORMAT_ENV: &str = "POLARIS_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = PolarisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" | "pretty" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(PolarisError::Config(format!("Unsupported log format: {other}"))),
        }
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns [`PolarisError::Internal`] when a global subscriber is already
/// installed.
pub fn init_tracing(format: LogFormat) -> Result<(), PolarisError> {
    let registry = tracing_subscriber::registry().with(env_filter());

    let result = match format {
        LogFormat::Plain => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => {
            let layer = fmt::layer().json().with_current_span(true).with_span_list(false);
            registry.with(layer).try_init()
        }
    };

    result.map_err(|e| PolarisError::Internal(format!("failed to initialise tracing: {e}")))
}

/// [`init_tracing`] with the format taken from `POLARIS_LOG_FORMAT`
///
/// # Errors
///
/// Returns [`PolarisError::Config`] for an unknown format, or
/// [`PolarisError::Internal`] when a subscriber is already installed.
pub fn init_tracing_from_env() -> Result<(), PolarisError> {
    let format = match std::env::var(LOG_FORMAT_ENV) {
        Ok(raw) => raw.parse()?,
        Err(_) => LogFormat::default(),
    };
    init_tracing(format)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
