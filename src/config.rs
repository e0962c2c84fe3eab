use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub observer: ObserverConfig,
    pub scanner: ScannerConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// Ethereum node connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub endpoint: String,
    /// Deadline for a single RPC call in seconds
    pub timeout_seconds: u64,
}

/// Background subscription poller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub enabled: bool,
    /// Delay between poll ticks in seconds
    pub poll_interval_seconds: u64,
}

/// On-demand range scans
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Blocks behind the chain head to scan when a request gives no range
    pub default_block_range: u64,
}

/// HTTP API server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: 5,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_block_range: 100,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ObserverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    ///
    /// The result is not validated yet; call [`AppConfig::validate`] once any
    /// command-line overrides have been applied.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&path)
    }

    /// Same as [`AppConfig::load`] with an explicit file path
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML file. A missing file yields the defaults.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = env::var("ETHEREUM_HOST") {
            self.rpc.endpoint = endpoint;
        }
        override_parsed("RPC_TIMEOUT_SECONDS", &mut self.rpc.timeout_seconds)?;

        override_parsed("OBSERVER_ENABLED", &mut self.observer.enabled)?;
        override_parsed("BLOCK_POLL_INTERVAL", &mut self.observer.poll_interval_seconds)?;

        override_parsed("DEFAULT_BLOCK_RANGE", &mut self.scanner.default_block_range)?;

        if let Ok(host) = env::var("SERVER_HOST") {
            self.api.host = host;
        }
        override_parsed("SERVER_PORT", &mut self.api.port)?;
        override_parsed("REQUEST_TIMEOUT_SECONDS", &mut self.api.request_timeout_seconds)?;

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.endpoint.starts_with("http://") && !self.rpc.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.rpc.endpoint.clone()));
        }

        check_range("rpc.timeout_seconds", self.rpc.timeout_seconds, 1, 300)?;
        check_range(
            "observer.poll_interval_seconds",
            self.observer.poll_interval_seconds,
            1,
            3600,
        )?;
        check_range("api.request_timeout_seconds", self.api.request_timeout_seconds, 1, 300)?;

        if self.api.port == 0 {
            return Err(invalid("api.port", self.api.port));
        }

        if self.api.host.trim().is_empty() {
            return Err(invalid("api.host", &self.api.host));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging.level", &self.logging.level));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid("logging.format", &self.logging.format));
        }

        Ok(())
    }

    /// Render the default configuration as TOML
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

fn override_parsed<T: FromStr>(key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(raw) = env::var(key) {
        *target = raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        })?;
    }
    Ok(())
}

fn check_range(key: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(invalid(key, value));
    }
    Ok(())
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
