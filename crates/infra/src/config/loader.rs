//! Configuration loader
//!
//! Loads the routing client configuration from environment variables or
//! files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment, if one exists
//! 2. Attempts to load from environment variables
//! 3. If `POLARIS_ACCOUNT_ENDPOINT` is missing, falls back to loading from
//!    file
//! 4. Probes multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `POLARIS_ACCOUNT_ENDPOINT`: Account metadata endpoint (required)
//! - `POLARIS_PREFERRED_REGIONS`: Comma-separated preferred regions
//! - `POLARIS_EXCLUDED_REGIONS`: Comma-separated excluded regions
//! - `POLARIS_REFRESH_INTERVAL_SECS`: Topology refresh interval in seconds
//! - `POLARIS_OPERATION_TIMEOUT_MS`: Per-operation deadline in milliseconds
//! - `POLARIS_CIRCUIT_BREAKER_ENABLED`: Whether partition circuits are used
//!   (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./polaris.toml` or `./polaris.json` (current working directory)
//! 2. `../polaris.toml` or `../polaris.json` (parent directory)
//! 3. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use polaris_domain::{ClientConfig, PolarisError, Result};

const CONFIG_FILE_NAMES: [&str; 2] = ["polaris.toml", "polaris.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the account
/// endpoint is not set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `PolarisError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<ClientConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `POLARIS_ACCOUNT_ENDPOINT` is required; every other field keeps its
/// default unless the matching variable is set.
///
/// # Errors
/// Returns `PolarisError::Config` if the endpoint is missing, a variable
/// has an invalid value, or validation fails.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::new(env_var("POLARIS_ACCOUNT_ENDPOINT")?);

    if let Some(regions) = env_list("POLARIS_PREFERRED_REGIONS") {
        config.preferred_regions = regions;
    }
    if let Some(regions) = env_list("POLARIS_EXCLUDED_REGIONS") {
        config.excluded_regions = regions;
    }
    if let Some(secs) = env_number::<u64>("POLARIS_REFRESH_INTERVAL_SECS", "refresh interval")? {
        config.topology.refresh_interval_secs = secs;
    }
    if let Some(ms) = env_number::<u64>("POLARIS_OPERATION_TIMEOUT_MS", "operation timeout")? {
        config.retry.operation_timeout_ms = ms;
    }
    config.circuit_breaker.enabled =
        env_bool("POLARIS_CIRCUIT_BREAKER_ENABLED", config.circuit_breaker.enabled);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `PolarisError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(PolarisError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            PolarisError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| PolarisError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| PolarisError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| PolarisError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(PolarisError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
            dirs.push(exe_dir.join(".."));
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `PolarisError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        PolarisError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Comma-separated list; blank entries are dropped
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
    })
}

/// Optional numeric variable
///
/// # Errors
/// Returns `PolarisError::Config` if the variable is set but not a number.
fn env_number<T>(key: &str, what: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| PolarisError::Config(format!("Invalid {}: {}", what, e))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
