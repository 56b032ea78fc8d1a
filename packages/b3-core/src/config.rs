//! Client and store configuration.
//!
//! Settings are resolved in three layers: built-in defaults, an optional TOML
//! file, then environment overrides. Blank environment values are ignored.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Shortest request timeout a client accepts.
pub const MIN_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Overrides the API base URL.
pub const ENV_API_URL: &str = "B3_API_URL";
/// Overrides the request timeout, in milliseconds.
pub const ENV_API_TIMEOUT_MS: &str = "B3_API_TIMEOUT_MS";
/// Points at a TOML settings file instead of the default location.
pub const ENV_CONFIG_FILE: &str = "B3_CONFIG_FILE";

// ============================================================================
// Transport Configuration
// ============================================================================

/// Base endpoint and timeout for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    /// Defaults with environment overrides applied; no config file is read.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Use a different base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = non_blank(lookup(ENV_API_URL)) {
            self.base_url = url;
        }
        match non_blank(lookup(ENV_API_TIMEOUT_MS)).map(|v| v.parse::<u64>()) {
            Some(Ok(ms)) if ms >= MIN_TIMEOUT_MS => self.timeout_ms = ms,
            Some(Ok(ms)) => {
                tracing::warn!(
                    "Ignoring {}={}: below the {} ms minimum",
                    ENV_API_TIMEOUT_MS,
                    ms,
                    MIN_TIMEOUT_MS
                );
            }
            Some(Err(_)) => {
                tracing::warn!("Ignoring invalid {} value", ENV_API_TIMEOUT_MS);
            }
            None => {}
        }
    }
}

// ============================================================================
// Store Configuration
// ============================================================================

/// What to do with a response that resolves after a newer request for the
/// same resource was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Commit it anyway; the last response to resolve wins.
    #[default]
    Commit,
    /// Drop it without touching state.
    Discard,
}

/// Behaviour knobs for [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    pub stale_policy: StalePolicy,
    /// Buffered states per async receiver before it starts lagging
    pub broadcast_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            stale_policy: StalePolicy::Commit,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl StoreOptions {
    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }
}

// ============================================================================
// Settings File
// ============================================================================

/// Everything configurable, as read from `config.toml`.
///
/// ```toml
/// [client]
/// base_url = "https://b3.example.com/api/v1"
/// timeout_ms = 15000
///
/// [store]
/// stale_policy = "discard"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub client: ClientConfig,
    pub store: StoreOptions,
}

impl Settings {
    /// Load settings from the default file location and the environment.
    pub fn load() -> Result<Self> {
        let mut settings = match Self::default_path() {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        settings.client.apply_overrides(|key| env::var(key).ok());
        Ok(settings)
    }

    /// Get the default settings file path.
    ///
    /// Default path: `<config dir>/b3-analytics/config.toml`
    /// Can be overridden with the `B3_CONFIG_FILE` environment variable.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = non_blank(env::var(ENV_CONFIG_FILE).ok()) {
            return Some(PathBuf::from(path));
        }

        directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("b3-analytics/config.toml"))
    }

    /// Read settings from a TOML file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
