//! Migration settings.

use std::time::Duration;

use migrate_core::limits::DEFAULT_MAX_CONCURRENT_FILES;
use migrate_core::{parse_duration, Error, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings for discovery, extraction and target preparation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MigrationConfig {
    /// Files extracted at once
    #[serde(default = "default_max_concurrent_files")]
    #[validate(range(min = 1, max = 65536))]
    pub max_concurrent_files: usize,
    /// Database to prepare; empty means the write database
    #[serde(default)]
    pub database: String,
    /// Address for administrative statements; empty means the first write address
    #[serde(default)]
    pub host: String,
    /// Create the database and one retention policy per archive retention
    #[serde(default)]
    pub create_database_and_policies: bool,
    #[serde(default = "default_replication_factor")]
    #[validate(range(min = 1))]
    pub replication_factor: u32,
    /// Policy made the database default; empty leaves the default alone
    #[serde(default)]
    pub default_retention_policy: String,
    /// Duration for the default policy when it has to be created
    #[serde(default)]
    pub default_duration: String,
    /// Ask before changing the target
    #[serde(default)]
    pub interactive_confirm: bool,
    /// Seconds between progress reports; 0 disables them
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
}

fn default_max_concurrent_files() -> usize {
    DEFAULT_MAX_CONCURRENT_FILES
}

fn default_replication_factor() -> u32 {
    1
}

fn default_progress_interval_secs() -> u64 {
    10
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: default_max_concurrent_files(),
            database: String::new(),
            host: String::new(),
            create_database_and_policies: false,
            replication_factor: default_replication_factor(),
            default_retention_policy: String::new(),
            default_duration: String::new(),
            interactive_confirm: false,
            progress_interval_secs: default_progress_interval_secs(),
        }
    }
}

impl MigrationConfig {
    /// Checks ranges and durations.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("migration: {}", e)))?;
        self.default_duration()?;
        Ok(())
    }

    /// Parsed `default_duration`, if set.
    pub fn default_duration(&self) -> Result<Option<Duration>> {
        if self.default_duration.is_empty() {
            return Ok(None);
        }
        parse_duration(&self.default_duration)
            .map(Some)
            .map_err(|e| Error::config(format!("migration.default_duration: {}", e)))
    }

    pub fn progress_interval(&self) -> Option<Duration> {
        (self.progress_interval_secs > 0).then(|| Duration::from_secs(self.progress_interval_secs))
    }
}
