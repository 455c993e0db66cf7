//! Write retry schedule.

use std::time::Duration;

use influx_client::InfluxConfig;

/// Additive backoff: retry `n` waits `base + increment * (n - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub increment: Duration,
    /// 0 retries forever
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_influx(&InfluxConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, increment: Duration, max_retries: u32) -> Self {
        Self {
            base,
            increment,
            max_retries,
        }
    }

    pub fn from_influx(config: &InfluxConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_base_ms),
            Duration::from_millis(config.retry_increment_ms),
            config.max_retries,
        )
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.base
            .saturating_add(self.increment.saturating_mul(retry.saturating_sub(1)))
    }

    /// Whether the `retry`-th retry may still be made.
    pub fn allows(&self, retry: u32) -> bool {
        self.max_retries == 0 || retry <= self.max_retries
    }
}
