//! Per-file point extraction.
//!
//! Each file is read on the blocking pool and its points are pushed into a
//! bounded queue with a blocking send, so a slow consumer stalls the reader
//! instead of letting it buffer the whole file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use migrate_core::limits::FILE_QUEUE_CAPACITY;
use migrate_core::{
    series_key, transform, Error, ErrorClass, OutputPoint, Result, RuleSet, SourcePoint,
};
use telemetry::metrics;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use whisper_archive::WhisperFile;

/// Turns whisper files into output points.
#[derive(Debug, Clone)]
pub struct FileExtractor {
    rules: Arc<RuleSet>,
    root: PathBuf,
    queue_capacity: usize,
}

/// How a file's extraction ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Complete(u64),
    /// Consumer went away before the file was exhausted.
    Abandoned(u64),
}

impl FileExtractor {
    /// Series keys are computed relative to `root`.
    pub fn new(rules: Arc<RuleSet>, root: impl Into<PathBuf>) -> Self {
        Self {
            rules,
            root: root.into(),
            queue_capacity: FILE_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Series key of a file under the root.
    pub fn series_key_for(&self, path: &Path) -> String {
        series_key(path.strip_prefix(&self.root).unwrap_or(path))
    }

    /// Start extracting one file.
    ///
    /// Points arrive on the returned receiver until the file is exhausted or
    /// fails. Rule and file errors are reported on `errors`; the receiver
    /// then simply closes.
    pub fn extract(
        &self,
        path: PathBuf,
        errors: mpsc::UnboundedSender<Error>,
    ) -> mpsc::Receiver<OutputPoint> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let rules = self.rules.clone();
        let key: Arc<str> = self.series_key_for(&path).into();

        let task_path = path.clone();
        let task_errors = errors.clone();
        let handle = tokio::task::spawn_blocking(move || {
            run(&rules, key, &task_path, tx, &task_errors);
        });

        // A panic in the reader must still show up in the run's errors.
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                metrics().files_failed.inc();
                let _ = errors.send(Error::extraction(
                    path,
                    format!("extraction task failed: {}", e),
                ));
            }
        });

        rx
    }
}

fn run(
    rules: &RuleSet,
    key: Arc<str>,
    path: &Path,
    tx: mpsc::Sender<OutputPoint>,
    errors: &mpsc::UnboundedSender<Error>,
) {
    let start = Instant::now();
    metrics().active_files.inc();

    let result = extract_file(rules, key.clone(), path, &tx, errors);

    metrics().active_files.dec();
    metrics()
        .file_extract_latency_ms
        .observe(start.elapsed().as_millis() as u64);

    match result {
        Ok(Finish::Complete(points)) => {
            metrics().files_completed.inc();
            debug!(
                series = %key,
                points = points,
                latency_ms = %start.elapsed().as_millis(),
                "Extracted file"
            );
        }
        Ok(Finish::Abandoned(points)) => {
            metrics().files_failed.inc();
            debug!(series = %key, points = points, "Point consumer closed, stopping extraction");
        }
        Err(e) => {
            if e.class() == ErrorClass::Matching {
                metrics().files_skipped.inc();
            } else {
                metrics().files_failed.inc();
            }
            warn!(series = %key, error = %e, "Skipping file");
            let _ = errors.send(e);
        }
    }
}

fn extract_file(
    rules: &RuleSet,
    key: Arc<str>,
    path: &Path,
    tx: &mpsc::Sender<OutputPoint>,
    errors: &mpsc::UnboundedSender<Error>,
) -> Result<Finish> {
    let stub = rules.match_key(&key, |e| {
        warn!(error = %e, "Invalid conversion rule");
        let _ = errors.send(e);
    })?;

    let mut file = WhisperFile::open(path).map_err(|e| Error::extraction(path, e.to_string()))?;
    let archives = file.archives().to_vec();
    let mut sent = 0u64;

    for (index, info) in archives.iter().enumerate() {
        let samples = file
            .dump_archive(index)
            .map_err(|e| Error::extraction(path, format!("archive {}: {}", index, e)))?;
        let retention = info.retention();
        let mut sentinels = 0u64;
        let mut non_finite = 0u64;
        let mut archive_points = 0u64;

        metrics().samples_read.inc_by(samples.len() as u64);
        for sample in samples {
            let source = SourcePoint {
                series_key: key.clone(),
                retention,
                value: sample.value,
                timestamp: i64::from(sample.timestamp),
            };
            if source.is_sentinel() {
                sentinels += 1;
                continue;
            }
            if !source.has_finite_value() {
                non_finite += 1;
                continue;
            }
            if tx.blocking_send(transform(&stub, &source)).is_err() {
                metrics().sentinel_samples.inc_by(sentinels);
                metrics().non_finite_samples.inc_by(non_finite);
                metrics().points_extracted.inc_by(archive_points);
                return Ok(Finish::Abandoned(sent));
            }
            archive_points += 1;
            sent += 1;
        }

        metrics().sentinel_samples.inc_by(sentinels);
        metrics().non_finite_samples.inc_by(non_finite);
        metrics().points_extracted.inc_by(archive_points);
        if non_finite > 0 {
            debug!(
                series = %key,
                archive = index,
                samples = non_finite,
                "Dropped non-finite samples"
            );
        }
        trace!(
            series = %key,
            archive = index,
            points = archive_points,
            sentinels = sentinels,
            "Extracted archive"
        );
    }

    Ok(Finish::Complete(sent))
}
