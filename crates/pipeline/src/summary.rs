//! End-of-run accounting.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use migrate_core::{Error, ErrorClass, Result};
use tracing::{error, info, warn};

use crate::sink::WriteResult;

/// Outcome of a migration run.
///
/// Every point is either counted in `points_written` or belongs to an entry
/// in `errors`.
#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub files_discovered: usize,
    /// Most files extracted at the same time
    pub peak_concurrent_files: usize,
    pub points_written: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
    /// Points in batches that were not stored
    pub points_failed: u64,
    total_latency: Duration,
    pub errors: Vec<Error>,
}

impl RunSummary {
    pub fn new(files_discovered: usize) -> Self {
        Self {
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            files_discovered,
            peak_concurrent_files: 0,
            points_written: 0,
            batches_written: 0,
            batches_failed: 0,
            points_failed: 0,
            total_latency: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    pub fn record_outcome(&mut self, outcome: Result<WriteResult>) {
        match outcome {
            Ok(result) => {
                self.points_written += result.points as u64;
                self.batches_written += 1;
                self.total_latency += result.latency;
            }
            Err(e) => {
                self.batches_failed += 1;
                if let Error::Write { points, .. } = &e {
                    self.points_failed += *points as u64;
                }
                self.errors.push(e);
            }
        }
    }

    pub fn record_error(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// Mean latency of stored batches.
    pub fn average_latency(&self) -> Duration {
        match u32::try_from(self.batches_written) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_latency / n,
            Err(_) => Duration::from_secs_f64(
                self.total_latency.as_secs_f64() / self.batches_written as f64,
            ),
        }
    }

    /// Files skipped because no rule matched.
    pub fn files_skipped(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| matches!(e, Error::NoMatch { .. }))
            .count()
    }

    /// Files that could not be read.
    pub fn files_failed(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.class() == ErrorClass::Extraction)
            .count()
    }

    pub fn files_completed(&self) -> usize {
        self.files_discovered
            .saturating_sub(self.files_skipped() + self.files_failed())
    }

    /// Error counts keyed by class code.
    pub fn errors_by_class(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for e in &self.errors {
            *counts.entry(e.code()).or_insert(0) += 1;
        }
        counts
    }

    /// Whether any batch was given up on.
    pub fn has_write_failures(&self) -> bool {
        self.batches_failed > 0
    }

    pub fn log(&self) {
        info!(
            files = self.files_discovered,
            files_completed = self.files_completed(),
            files_skipped = self.files_skipped(),
            files_failed = self.files_failed(),
            peak_concurrent_files = self.peak_concurrent_files,
            points_written = self.points_written,
            batches_written = self.batches_written,
            avg_latency_ms = %self.average_latency().as_millis(),
            elapsed_ms = %self.elapsed.as_millis(),
            "Migration finished"
        );

        for e in &self.errors {
            match e.class() {
                ErrorClass::Sink | ErrorClass::Internal => error!(code = e.code(), "{}", e),
                _ => warn!(code = e.code(), "{}", e),
            }
        }

        if !self.errors.is_empty() {
            warn!(
                errors = self.errors.len(),
                by_class = ?self.errors_by_class(),
                points_failed = self.points_failed,
                "Migration finished with errors"
            );
        }
    }
}
