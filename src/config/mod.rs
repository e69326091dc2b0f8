//! Configuration for hdamigrate

mod logging;
mod migration;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use migration::MigrationConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "hdamigrate.toml";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Migration configuration
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate all configuration fields, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();
        let migration = &self.migration;

        if migration.archive_extension.is_empty() {
            errors.push("archive_extension must not be empty".to_string());
        }
        if migration.archive_extension.starts_with('.') {
            errors.push("archive_extension must not start with '.'".to_string());
        }
        if migration.count_dir.is_empty() {
            errors.push("count_dir must not be empty".to_string());
        }
        if migration.source_field_prefix.is_empty() {
            errors.push("source_field_prefix must not be empty".to_string());
        }
        if !migration.archive_extension.is_empty()
            && !migration
                .definitions_file
                .ends_with(&format!(".{}", migration.archive_extension))
        {
            errors.push(format!(
                "definitions_file '{}' must have the archive extension '.{}'",
                migration.definitions_file, migration.archive_extension
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
