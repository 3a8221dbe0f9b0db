//! Configuration management for Minetrack services.
//!
//! All services share a configuration file at `~/.minetrack/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (MINETRACK_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `MINETRACK_PORT` → tracker.port
//! - `MINETRACK_BIND_ADDRESS` → network.bind
//! - `MINETRACK_DB_PATH` → tracker.db_path
//! - `MINETRACK_LOG_LEVEL` → observability.log_level

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".minetrack"),
        |dirs| dirs.home_dir().join(".minetrack"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration (Global bind address)
// ============================================================================

/// Global network configuration.
///
/// Controls the bind address for the service. Default is `127.0.0.1`
/// (local only). Set to `0.0.0.0` to allow remote access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address for the service.
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Public URL for callbacks (optional).
    /// Used when the service is behind a reverse proxy or tunnel.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            public_url: None,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to exclude from logging.
    ///
    /// These modules will be set to `warn` level to reduce noise.
    /// Built-in noisy modules (hyper, reqwest, h2, rustls, tokio_util) are
    /// always filtered; this list allows adding custom modules.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Tracker Service Configuration
// ============================================================================

/// Tracker service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Tracker service HTTP port
    #[serde(default = "default_tracker_port")]
    pub port: u16,

    /// Tracker service HTTP host
    #[serde(default = "default_host")]
    pub host: String,

    /// Path to the SQLite database. Defaults to `~/.minetrack/tracker.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Endpoint for the live BTC spot-price lookup.
    #[serde(default)]
    pub btc_price_url: Option<String>,

    /// Timeout for outbound price requests, in seconds.
    #[serde(default = "default_price_timeout_secs")]
    pub price_timeout_secs: u64,

    /// Request timeout for inbound HTTP requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            port: default_tracker_port(),
            host: default_host(),
            db_path: None,
            btc_price_url: None,
            price_timeout_secs: default_price_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TrackerConfig {
    /// Resolve the database path, falling back to the config directory.
    pub fn database_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| config_dir().join("tracker.db"))
    }
}

fn default_tracker_port() -> u16 {
    4450
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_price_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for Minetrack services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Global network configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Tracker service configuration
    #[serde(default)]
    pub tracker: Option<TrackerConfig>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable fallbacks.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("MINETRACK_PORT") {
            if let Ok(p) = port.parse() {
                self.tracker.get_or_insert_with(TrackerConfig::default).port = p;
            }
        }

        if let Ok(bind) = std::env::var("MINETRACK_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Ok(path) = std::env::var("MINETRACK_DB_PATH") {
            self.tracker
                .get_or_insert_with(TrackerConfig::default)
                .db_path = Some(PathBuf::from(path));
        }

        if let Ok(level) = std::env::var("MINETRACK_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = config_path();
        let dir = config_dir();

        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Get the effective tracker configuration, using defaults when the
    /// section is absent from the config file.
    pub fn tracker(&self) -> TrackerConfig {
        self.tracker.clone().unwrap_or_default()
    }

    /// Get the effective bind address.
    pub fn bind_address(&self) -> &str {
        &self.network.bind
    }
}
