//! InfluxDB sink configuration.

use std::time::Duration;

use migrate_core::limits::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_MS, DEFAULT_RETRY_INCREMENT_MS,
    DEFAULT_WRITE_CONCURRENCY,
};
use migrate_core::{parse_duration, Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

/// Timestamp precision of written points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precision {
    #[default]
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "u", alias = "us")]
    Microseconds,
    #[serde(rename = "ns")]
    Nanoseconds,
}

impl Precision {
    /// Query parameter value for `/write`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Milliseconds => "ms",
            Self::Microseconds => "u",
            Self::Nanoseconds => "ns",
        }
    }

    /// Convert epoch seconds to this precision.
    pub fn scale(&self, epoch_secs: i64) -> i64 {
        match self {
            Self::Seconds => epoch_secs,
            Self::Milliseconds => epoch_secs.saturating_mul(1_000),
            Self::Microseconds => epoch_secs.saturating_mul(1_000_000),
            Self::Nanoseconds => epoch_secs.saturating_mul(1_000_000_000),
        }
    }
}

/// InfluxDB client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InfluxConfig {
    /// Disabled sinks drain points without writing them
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Write endpoints, used round-robin
    #[serde(default = "default_addresses")]
    #[validate(length(min = 1))]
    pub addresses: Vec<String>,
    /// Target database
    #[serde(default = "default_database")]
    #[validate(length(min = 1))]
    pub database: String,
    #[serde(default)]
    pub precision: Precision,
    /// Points per write request
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,
    /// Pause after every write attempt (e.g. "100ms", "0s")
    #[serde(default = "default_batch_interval")]
    pub batch_interval: String,
    /// Maximum in-flight write requests
    #[serde(default = "default_write_concurrency")]
    #[validate(range(min = 1, max = 1024))]
    pub write_concurrency: usize,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    /// First retry delay in milliseconds
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Added to the delay on each further retry, in milliseconds
    #[serde(default = "default_retry_increment_ms")]
    pub retry_increment_ms: u64,
    /// Retries per batch before giving up (0 = retry forever)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_addresses() -> Vec<String> {
    vec!["http://localhost:8086".to_string()]
}

fn default_database() -> String {
    "graphite".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_batch_interval() -> String {
    "0s".to_string()
}

fn default_write_concurrency() -> usize {
    DEFAULT_WRITE_CONCURRENCY
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_base_ms() -> u64 {
    DEFAULT_RETRY_BASE_MS
}

fn default_retry_increment_ms() -> u64 {
    DEFAULT_RETRY_INCREMENT_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            addresses: default_addresses(),
            database: default_database(),
            precision: Precision::default(),
            batch_size: default_batch_size(),
            batch_interval: default_batch_interval(),
            write_concurrency: default_write_concurrency(),
            timeout_secs: default_timeout_secs(),
            username: None,
            password: None,
            retry_base_ms: default_retry_base_ms(),
            retry_increment_ms: default_retry_increment_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl InfluxConfig {
    /// Checks ranges, addresses and durations.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("influx: {}", e)))?;
        for address in &self.addresses {
            parse_address(address)?;
        }
        self.batch_interval()?;
        Ok(())
    }

    /// Parsed `batch_interval`.
    pub fn batch_interval(&self) -> Result<Duration> {
        parse_duration(&self.batch_interval)
            .map_err(|e| Error::config(format!("influx.batch_interval: {}", e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parse an address into a base URL, defaulting the scheme to `http`.
///
/// The returned URL always ends in `/` so endpoint paths join below it.
pub fn parse_address(address: &str) -> Result<Url> {
    let trimmed = address.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| Error::config(format!("invalid address {:?}: {}", address, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "unsupported scheme in address {:?}",
            address
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
