//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_UNIT_MS, DEFAULT_MAX_STALE_RETRIES, DEFAULT_MAX_TRANSIENT_RETRIES,
    DEFAULT_STALE_CONFLICT_MARKER, DEFAULT_TIMEOUT_SECS,
};
use crate::types::EntityDescriptor;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// API root, e.g. `https://erp.example.com/api/v2.0`
    pub base_url: String,
    /// Company identifier inserted as `companies(<id>)` when set
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

/// Retry bounds and backoff policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Resends allowed for transient statuses before giving up
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,
    /// Linear backoff unit; the n-th resend waits `n * unit`
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
    /// Refresh-and-resubmit rounds after a stale-etag conflict
    #[serde(default = "default_max_stale_retries")]
    pub max_stale_retries: u32,
}

/// Optimistic-concurrency settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Substring of a 409 body that identifies a stale `If-Match` etag
    #[serde(default = "default_stale_conflict_marker")]
    pub stale_conflict_marker: String,
}

impl EngineConfig {
    /// Create a configuration with defaults for everything but the API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            company: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            retry: RetryConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Collection endpoint for an entity, scoped to the company when one is
    /// configured.
    pub fn collection_url(&self, entity: &EntityDescriptor) -> String {
        let root = self.base_url.trim_end_matches('/');
        match self.company.as_deref().filter(|c| !c.is_empty()) {
            Some(company) => format!("{root}/companies({company})/{}", entity.collection),
            None => format!("{root}/{}", entity.collection),
        }
    }
}

impl RetryConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_transient_retries: DEFAULT_MAX_TRANSIENT_RETRIES,
            backoff_unit_ms: DEFAULT_BACKOFF_UNIT_MS,
            max_stale_retries: DEFAULT_MAX_STALE_RETRIES,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { stale_conflict_marker: default_stale_conflict_marker() }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_transient_retries() -> u32 {
    DEFAULT_MAX_TRANSIENT_RETRIES
}

fn default_backoff_unit_ms() -> u64 {
    DEFAULT_BACKOFF_UNIT_MS
}

fn default_max_stale_retries() -> u32 {
    DEFAULT_MAX_STALE_RETRIES
}

fn default_stale_conflict_marker() -> String {
    DEFAULT_STALE_CONFLICT_MARKER.to_string()
}
