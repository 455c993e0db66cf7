//! Migration progress metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        // Saturate so an unbalanced dec cannot wrap to u64::MAX.
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s, 30s
    buckets: [AtomicU64; 12],
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 12] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000, 30000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(ms, Ordering::Relaxed);

        let last = Self::BUCKET_BOUNDS.len() - 1;
        let index = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(last);
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper bound, count)` per bucket.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Process-wide migration metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Files
    pub files_discovered: Counter,
    pub files_completed: Counter,
    pub files_skipped: Counter,
    pub files_failed: Counter,

    // Extraction
    pub samples_read: Counter,
    pub sentinel_samples: Counter,
    pub non_finite_samples: Counter,
    pub points_extracted: Counter,
    pub points_discarded: Counter,

    // Sink
    pub batches_written: Counter,
    pub points_written: Counter,
    pub write_attempts: Counter,
    pub write_retries: Counter,
    pub write_failures: Counter,

    pub write_latency_ms: Histogram,
    pub file_extract_latency_ms: Histogram,

    pub active_files: Gauge,
    pub active_writes: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            files_discovered: self.files_discovered.get(),
            files_completed: self.files_completed.get(),
            files_skipped: self.files_skipped.get(),
            files_failed: self.files_failed.get(),
            samples_read: self.samples_read.get(),
            sentinel_samples: self.sentinel_samples.get(),
            non_finite_samples: self.non_finite_samples.get(),
            points_extracted: self.points_extracted.get(),
            points_discarded: self.points_discarded.get(),
            batches_written: self.batches_written.get(),
            points_written: self.points_written.get(),
            write_attempts: self.write_attempts.get(),
            write_retries: self.write_retries.get(),
            write_failures: self.write_failures.get(),
            write_latency_mean_ms: self.write_latency_ms.mean(),
            write_latency_max_ms: self.write_latency_ms.max(),
            file_extract_latency_mean_ms: self.file_extract_latency_ms.mean(),
            active_files: self.active_files.get(),
            active_writes: self.active_writes.get(),
        }
    }

    /// Log a one-line progress report.
    pub fn log_progress(&self) {
        let s = self.snapshot();
        info!(
            files_done = s.files_completed + s.files_skipped + s.files_failed,
            files_total = s.files_discovered,
            active_files = s.active_files,
            points_extracted = s.points_extracted,
            points_written = s.points_written,
            active_writes = s.active_writes,
            write_retries = s.write_retries,
            write_latency_mean_ms = %format!("{:.1}", s.write_latency_mean_ms),
            "Migration progress"
        );
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub files_discovered: u64,
    pub files_completed: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub samples_read: u64,
    pub sentinel_samples: u64,
    pub non_finite_samples: u64,
    pub points_extracted: u64,
    pub points_discarded: u64,
    pub batches_written: u64,
    pub points_written: u64,
    pub write_attempts: u64,
    pub write_retries: u64,
    pub write_failures: u64,
    pub write_latency_mean_ms: f64,
    pub write_latency_max_ms: u64,
    pub file_extract_latency_mean_ms: f64,
    pub active_files: u64,
    pub active_writes: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
