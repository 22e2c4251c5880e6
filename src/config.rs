//! Application configuration
//!
//! Loaded once at startup from `config/<env>.yaml`, then overridden from
//! environment variables, and passed explicitly to whatever needs it.

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::storage::postgres::IsolationLevel;

pub const ENV_DATABASE_URL: &str = "BULK_TRANSFER_DATABASE_URL";
pub const ENV_HOST: &str = "BULK_TRANSFER_HOST";
pub const ENV_PORT: &str = "BULK_TRANSFER_PORT";
pub const ENV_LOG_LEVEL: &str = "BULK_TRANSFER_LOG_LEVEL";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// never | hourly | daily
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "bulk_transfer.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for one transfer batch, including storage I/O
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// How long startup waits for the database to answer pings
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    #[serde(default)]
    pub isolation: IsolationLevel,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

fn default_max_connections() -> u32 {
    30
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_ready_timeout_ms() -> u64 {
    30_000
}

impl AppConfig {
    /// Load `config/<env>.yaml` and apply process environment overrides
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override fields from variables returned by `get`
    pub fn apply_env<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(host) = get(ENV_HOST) {
            self.gateway.host = host;
        }
        if let Some(port) = get(ENV_PORT) {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("Invalid value for {}: {}", ENV_PORT, port))?;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.logging.log_level = level;
        }
        Ok(())
    }
}
