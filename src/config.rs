//! Configuration management for Stromspot
//!
//! This module handles loading, validation, and management of the service
//! configuration from YAML files with support for environment variable
//! overrides of the credentials.

use crate::error::{Result, StromspotError};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

pub use defaults::{
    DEFAULT_BLOCK_HOURS, DEFAULT_CONSUMPTION_INTERVAL_MINUTES, DEFAULT_PRICE_INTERVAL_MINUTES,
    DEFAULT_TIMEOUT_SECONDS, DEFAULT_UPDATE_OFFSET_SECONDS,
};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "STROMSPOT_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Upstream environment (production or sandbox)
    pub environment: ApiEnvironment,

    /// OAuth2 client credentials
    pub credentials: CredentialsConfig,

    /// Postal code used for price lookups (taxes and levies are regional)
    pub zip_code: String,

    /// Contract id; consumption and cost outputs are disabled when absent
    pub contract_id: Option<String>,

    /// IANA timezone used for day boundaries and schedule alignment
    pub timezone: String,

    /// Refresh cycle timing
    pub schedule: ScheduleConfig,

    /// Length of the cheapest contiguous block in hours (3 or 4)
    pub block_hours: usize,

    /// HTTP client settings
    pub http: HttpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Upstream API environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiEnvironment {
    #[default]
    Production,
    Sandbox,
}

impl ApiEnvironment {
    /// Base URL of the data API
    pub const fn api_base_url(self) -> &'static str {
        match self {
            Self::Production => "https://production.ostrom-api.io",
            Self::Sandbox => "https://sandbox.ostrom-api.io",
        }
    }

    /// Base URL of the OAuth2 authorization server
    pub const fn auth_base_url(self) -> &'static str {
        match self {
            Self::Production => "https://auth.production.ostrom-api.io",
            Self::Sandbox => "https://auth.sandbox.ostrom-api.io",
        }
    }
}

/// OAuth2 client credentials
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Interval and offset of the two refresh cycles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Price refresh interval in minutes (5..=120)
    pub price_interval_minutes: u32,

    /// Consumption refresh interval in minutes (15..=1440)
    pub consumption_interval_minutes: u32,

    /// Seconds past each interval boundary at which a cycle fires (0..=59)
    pub update_offset_seconds: u32,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (1..=120)
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional override for console output level
    pub console_level: Option<String>,

    /// Optional override for file output level
    pub file_level: Option<String>,

    /// Path to log file (its directory is used for the rolling appender)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file without validation
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load, apply environment overrides and validate
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => {
                let default_paths = ["stromspot.yaml", "/etc/stromspot/config.yaml"];
                match default_paths.iter().find(|p| Path::new(p).exists()) {
                    Some(path) => Self::from_file(path)?,
                    None => Self::default(),
                }
            }
        };
        config.apply_env_overrides();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Override credentials and contract id from the process environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("STROMSPOT_CLIENT_ID") {
            self.credentials.client_id = v;
        }
        if let Ok(v) = std::env::var("STROMSPOT_CLIENT_SECRET") {
            self.credentials.client_secret = v;
        }
        if let Ok(v) = std::env::var("STROMSPOT_CONTRACT_ID") {
            self.contract_id = Some(v);
        }
    }

    /// Trim string fields and treat an empty contract id as absent
    pub fn normalize(&mut self) {
        self.zip_code = self.zip_code.trim().to_string();
        self.credentials.client_id = self.credentials.client_id.trim().to_string();
        self.contract_id = self
            .contract_id
            .take()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
    }

    /// Contract id if consumption outputs are enabled
    pub fn contract_id(&self) -> Option<&str> {
        self.contract_id.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            StromspotError::validation(
                "timezone".to_string(),
                format!("Unknown timezone '{}'", self.timezone),
            )
        })
    }

    /// Per-request HTTP timeout
    pub const fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http.timeout_seconds)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.credentials.client_id.trim().is_empty() {
            return Err(StromspotError::config("Missing required client_id"));
        }

        if self.credentials.client_secret.is_empty() {
            return Err(StromspotError::config("Missing required client_secret"));
        }

        if self.zip_code.trim().is_empty() {
            return Err(StromspotError::validation(
                "zip_code",
                "Postal code cannot be empty",
            ));
        }

        self.tz()?;

        if !(5..=120).contains(&self.schedule.price_interval_minutes) {
            return Err(StromspotError::validation(
                "schedule.price_interval_minutes",
                "Must be between 5 and 120",
            ));
        }

        if !(15..=1440).contains(&self.schedule.consumption_interval_minutes) {
            return Err(StromspotError::validation(
                "schedule.consumption_interval_minutes",
                "Must be between 15 and 1440",
            ));
        }

        if self.schedule.update_offset_seconds > 59 {
            return Err(StromspotError::validation(
                "schedule.update_offset_seconds",
                "Must be between 0 and 59",
            ));
        }

        if !matches!(self.block_hours, 3 | 4) {
            return Err(StromspotError::validation(
                "block_hours",
                "Must be 3 or 4",
            ));
        }

        if !(1..=120).contains(&self.http.timeout_seconds) {
            return Err(StromspotError::validation(
                "http.timeout_seconds",
                "Must be between 1 and 120",
            ));
        }

        Ok(())
    }
}
