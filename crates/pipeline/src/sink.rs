//! Batching sink: groups points per retention policy and writes them with
//! bounded concurrency and retries.

use std::sync::Arc;
use std::time::Duration;

use influx_client::{InfluxConfig, PointWriter};
use migrate_core::{Error, OutputPoint, Result};
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, trace, warn};

use crate::batch::{Batch, BatchSet};
use crate::limiter::ConcurrencyLimiter;
use crate::retry::RetryPolicy;

/// Sink configuration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Disabled sinks drain their input without writing
    pub enabled: bool,
    /// Points received between flushes
    pub batch_size: usize,
    /// Pause after every write attempt
    pub batch_interval: Duration,
    /// Maximum in-flight writes
    pub write_concurrency: usize,
    pub retry: RetryPolicy,
    /// Known retention policies, each with its own batch
    pub policies: Vec<String>,
    /// Batch for points whose policy is not known
    pub default_policy: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: migrate_core::limits::DEFAULT_BATCH_SIZE,
            batch_interval: Duration::ZERO,
            write_concurrency: migrate_core::limits::DEFAULT_WRITE_CONCURRENCY,
            retry: RetryPolicy::default(),
            policies: Vec::new(),
            default_policy: String::new(),
        }
    }
}

impl SinkConfig {
    pub fn from_influx(config: &InfluxConfig) -> Result<Self> {
        Ok(Self {
            enabled: config.enabled,
            batch_size: config.batch_size.max(1),
            batch_interval: config.batch_interval()?,
            write_concurrency: config.write_concurrency,
            retry: RetryPolicy::from_influx(config),
            policies: Vec::new(),
            default_policy: String::new(),
        })
    }

    pub fn with_policies(
        mut self,
        policies: Vec<String>,
        default_policy: impl Into<String>,
    ) -> Self {
        self.policies = policies;
        self.default_policy = default_policy.into();
        self
    }
}

/// A batch that was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    pub policy: String,
    pub points: usize,
    /// Latency of the successful attempt
    pub latency: Duration,
    pub attempts: u32,
}

/// What the sink did with its input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub points_received: u64,
    /// Non-empty batches handed to writers
    pub batches: u64,
    /// Points drained by a disabled sink
    pub points_discarded: u64,
}

/// Writes points in per-policy batches.
pub struct BatchingSink {
    writer: Arc<dyn PointWriter>,
    config: SinkConfig,
    limiter: ConcurrencyLimiter,
}

impl BatchingSink {
    pub fn new(writer: Arc<dyn PointWriter>, config: SinkConfig) -> Self {
        let limiter = ConcurrencyLimiter::new(config.write_concurrency);
        Self {
            writer,
            config,
            limiter,
        }
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Consume `points` until the channel closes.
    ///
    /// Every non-empty batch produces exactly one outcome on `outcomes`.
    /// Outcomes must be consumed concurrently: write tasks hold their slot
    /// until their outcome is accepted. Returns after every write finished.
    pub async fn send(
        &self,
        mut points: mpsc::Receiver<OutputPoint>,
        outcomes: mpsc::Sender<Result<WriteResult>>,
    ) -> Result<SinkReport> {
        let mut report = SinkReport::default();

        if !self.config.enabled {
            while points.recv().await.is_some() {
                report.points_discarded += 1;
            }
            metrics().points_discarded.inc_by(report.points_discarded);
            info!(points = report.points_discarded, "Sink disabled, discarded points");
            return Ok(report);
        }

        let mut batches = BatchSet::new(self.config.policies.as_slice(), &self.config.default_policy);
        let mut tasks = JoinSet::new();
        let mut since_flush = 0usize;

        info!(
            batch_size = self.config.batch_size,
            write_concurrency = self.limiter.max(),
            policies = ?batches.policies(),
            "Batching sink started"
        );

        while let Some(point) = points.recv().await {
            batches.push(point);
            report.points_received += 1;
            since_flush += 1;

            if since_flush >= self.config.batch_size {
                since_flush = 0;
                self.flush(&mut batches, &mut tasks, &outcomes, &mut report)
                    .await?;
            }

            while let Some(joined) = tasks.try_join_next() {
                reap(joined, &outcomes).await;
            }
        }

        self.flush(&mut batches, &mut tasks, &outcomes, &mut report)
            .await?;

        while let Some(joined) = tasks.join_next().await {
            reap(joined, &outcomes).await;
        }

        info!(
            points = report.points_received,
            batches = report.batches,
            "Batching sink finished"
        );
        Ok(report)
    }

    async fn flush(
        &self,
        batches: &mut BatchSet,
        tasks: &mut JoinSet<()>,
        outcomes: &mpsc::Sender<Result<WriteResult>>,
        report: &mut SinkReport,
    ) -> Result<()> {
        for batch in batches.take_all() {
            let permit = self.limiter.acquire().await?;
            report.batches += 1;
            trace!(policy = batch.policy(), points = batch.len(), "Flushing batch");

            let writer = self.writer.clone();
            let outcomes = outcomes.clone();
            let retry = self.config.retry;
            let interval = self.config.batch_interval;

            tasks.spawn(async move {
                let _permit = permit;
                metrics().active_writes.inc();
                let result = write_with_retry(writer.as_ref(), batch, retry, interval).await;
                metrics().active_writes.dec();
                let _ = outcomes.send(result).await;
            });
        }
        Ok(())
    }
}

async fn reap(
    joined: std::result::Result<(), JoinError>,
    outcomes: &mpsc::Sender<Result<WriteResult>>,
) {
    if let Err(e) = joined {
        error!(error = %e, "Write task failed");
        metrics().write_failures.inc();
        let _ = outcomes
            .send(Err(Error::internal(format!("write task failed: {}", e))))
            .await;
    }
}

/// Write one batch, retrying until it is stored or the retry cap is hit.
pub async fn write_with_retry(
    writer: &dyn PointWriter,
    batch: Batch,
    retry: RetryPolicy,
    interval: Duration,
) -> Result<WriteResult> {
    let policy = batch.policy().to_string();
    let points = batch.into_points();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        metrics().write_attempts.inc();

        let failure = match writer.write_points(&policy, &points).await {
            Ok(response) if response.is_success() => {
                pace(interval).await;
                metrics().batches_written.inc();
                metrics().points_written.inc_by(points.len() as u64);
                metrics()
                    .write_latency_ms
                    .observe(response.elapsed.as_millis() as u64);
                debug!(
                    policy = %policy,
                    count = points.len(),
                    attempts = attempts,
                    latency_ms = %response.elapsed.as_millis(),
                    "Wrote batch"
                );
                return Ok(WriteResult {
                    policy,
                    points: points.len(),
                    latency: response.elapsed,
                    attempts,
                });
            }
            Ok(response) => format!(
                "unexpected status {}: {}",
                response.status,
                response.body.trim()
            ),
            Err(e) => e.to_string(),
        };

        pace(interval).await;

        if !retry.allows(attempts) {
            metrics().write_failures.inc();
            error!(
                policy = %policy,
                count = points.len(),
                attempts = attempts,
                error = %failure,
                "Giving up on batch"
            );
            return Err(Error::Write {
                policy,
                points: points.len(),
                attempts,
                message: failure,
            });
        }

        let backoff = retry.delay(attempts);
        metrics().write_retries.inc();
        warn!(
            policy = %policy,
            attempt = attempts,
            backoff_ms = %backoff.as_millis(),
            error = %failure,
            "Retrying write"
        );
        tokio::time::sleep(backoff).await;
    }
}

async fn pace(interval: Duration) {
    if !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}
