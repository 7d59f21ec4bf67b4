use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Floor level for punitive actions, applied on top of any per-action
    /// minimum from the room's level document
    pub moderator_threshold: i64,

    /// Interval between reconciliation sweeps
    pub sweep_interval_seconds: u64,

    /// Record key under which ban records are stored
    pub ban_record_key: String,

    /// Account document key under which the role registry is stored
    pub role_document_key: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            moderator_threshold: 50,
            sweep_interval_seconds: 300,
            ban_record_key: "org.vigil.ban".to_string(),
            role_document_key: "org.vigil.roles".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (VIGIL_LOGGING_LEVEL, etc.)
        builder = builder.add_source(
            Environment::with_prefix("VIGIL")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get the sweep interval as a [`std::time::Duration`]
    #[must_use]
    pub const fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.moderation.sweep_interval_seconds)
    }
}
