//! Configuration loader
//!
//! Loads the engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `ERPSYNC_BASE_URL` is missing or a value is invalid, falls back to
//!    loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `ERPSYNC_BASE_URL`: API root (required)
//! - `ERPSYNC_COMPANY`: Company identifier
//! - `ERPSYNC_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `ERPSYNC_USER_AGENT`: User agent sent with every request
//! - `ERPSYNC_MAX_TRANSIENT_RETRIES`: Resends allowed for 409/503
//! - `ERPSYNC_BACKOFF_UNIT_MS`: Linear backoff unit in milliseconds
//! - `ERPSYNC_MAX_STALE_RETRIES`: Refresh-and-resubmit rounds after a stale
//!   etag
//! - `ERPSYNC_STALE_CONFLICT_MARKER`: 409 body substring signalling a stale
//!   etag
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./erpsync.json` or `./erpsync.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use erpsync_domain::{EngineConfig, ErpSyncError, Result};

use crate::errors::InfraError;

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ErpSyncError::Config` if neither the environment nor any config
/// file yields a valid configuration.
pub fn load() -> Result<EngineConfig> {
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
/// Only `ERPSYNC_BASE_URL` is required; unset optional variables keep their
/// defaults.
///
/// # Errors
/// Returns `ErpSyncError::Config` if the base URL is missing or a numeric
/// variable does not parse.
pub fn load_from_env() -> Result<EngineConfig> {
    let mut config = EngineConfig::new(env_var("ERPSYNC_BASE_URL")?);

    config.company = env_opt("ERPSYNC_COMPANY");
    config.user_agent = env_opt("ERPSYNC_USER_AGENT");

    if let Some(timeout) = env_parse("ERPSYNC_TIMEOUT_SECS")? {
        config.timeout_secs = timeout;
    }
    if let Some(retries) = env_parse("ERPSYNC_MAX_TRANSIENT_RETRIES")? {
        config.retry.max_transient_retries = retries;
    }
    if let Some(unit) = env_parse("ERPSYNC_BACKOFF_UNIT_MS")? {
        config.retry.backoff_unit_ms = unit;
    }
    if let Some(retries) = env_parse("ERPSYNC_MAX_STALE_RETRIES")? {
        config.retry.max_stale_retries = retries;
    }
    if let Some(marker) = env_opt("ERPSYNC_STALE_CONFLICT_MARKER") {
        config.concurrency.stale_conflict_marker = marker;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// file extension.
///
/// # Errors
/// Returns `ErpSyncError::Config` if the file is missing, unreadable, or not
/// a valid configuration.
pub fn load_from_file(path: Option<PathBuf>) -> Result<EngineConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ErpSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ErpSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<EngineConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let config: EngineConfig = match extension {
        "toml" => toml::from_str(contents).map_err(InfraError::from)?,
        "json" => serde_json::from_str(contents)
            .map_err(|e| ErpSyncError::Config(format!("Invalid JSON format: {e}")))?,
        _ => {
            return Err(ErpSyncError::Config(format!("Unsupported config format: {extension}")))
        }
    };

    if config.base_url.trim().is_empty() {
        return Err(ErpSyncError::Config("base_url must not be empty".into()));
    }
    Ok(config)
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("erpsync.json"),
        dir.join("erpsync.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        ErpSyncError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Non-empty value of `key`, if set.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ErpSyncError::Config(format!("Invalid {key}: {e}")))
        })
        .transpose()
}
