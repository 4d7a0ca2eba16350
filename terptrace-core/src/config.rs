//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/terptrace/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/terptrace/` (~/.config/terptrace/)
//! - State/Logs: `$XDG_STATE_HOME/terptrace/` (~/.local/state/terptrace/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Log file name, shared with the logging module's rotation setup
pub const LOG_FILE_NAME: &str = "terptrace.log";

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Collection-service configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Collection-service configuration
///
/// Endpoint and credentials for the service the pipeline transmits to,
/// plus the dispatch tunables.
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Collection service URL (e.g., `https://collect.terptrace.dev`)
    pub endpoint: Option<String>,

    /// API key (format: "tt_live_xxxx")
    pub api_key: Option<String>,

    /// Partner code from onboarding
    pub partner_code: Option<String>,

    /// Location code from onboarding
    pub location_code: Option<String>,

    /// Requests drained per batch (max 50, default 20)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            partner_code: None,
            location_code: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout(),
        }
    }
}

impl TelemetryConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        match self.endpoint.as_deref() {
            None | Some("") => {
                return Err(Error::Config("telemetry.endpoint is required".to_string()))
            }
            Some(_) => {}
        }
        if self.partner_code.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(
                "telemetry.partner_code must be non-empty".to_string(),
            ));
        }
        if self.location_code.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(
                "telemetry.location_code must be non-empty".to_string(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > 50 {
            return Err(Error::Config(
                "telemetry.batch_size must be between 1 and 50".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_batch_size() -> usize {
    20
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/terptrace/config.toml` (~/.config/terptrace/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("terptrace").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/terptrace/` (~/.local/state/terptrace/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("terptrace")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/terptrace/terptrace.log` (~/.local/state/terptrace/terptrace.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join(LOG_FILE_NAME)
    }
}
