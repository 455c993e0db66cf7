//! Migration orchestrator.
//!
//! Discovers files, extracts them with bounded fan-out, merges their points
//! into one queue for the sink and collects every outcome and error into a
//! [`RunSummary`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use migrate_core::limits::{MERGE_QUEUE_CAPACITY, OUTCOME_QUEUE_CAPACITY};
use migrate_core::{Error, OutputPoint, Result, RuleSet};
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::MigrationConfig;
use crate::discovery::find_archive_files;
use crate::extractor::FileExtractor;
use crate::limiter::ConcurrencyLimiter;
use crate::sink::BatchingSink;
use crate::summary::RunSummary;

/// One migration run over a whisper directory.
pub struct Migration {
    root: PathBuf,
    extractor: Arc<FileExtractor>,
    max_concurrent_files: usize,
}

impl Migration {
    pub fn new(rules: Arc<RuleSet>, root: impl Into<PathBuf>, config: &MigrationConfig) -> Self {
        let root = root.into();
        Self {
            extractor: Arc::new(FileExtractor::new(rules, root.clone())),
            root,
            max_concurrent_files: config.max_concurrent_files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run to completion.
    ///
    /// Only discovery failures and internal failures are returned as errors;
    /// everything else ends up in the summary.
    pub async fn run(&self, sink: &BatchingSink) -> Result<RunSummary> {
        let started = Instant::now();

        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || find_archive_files(&root))
            .await
            .map_err(|e| Error::internal(format!("discovery task failed: {}", e)))??;

        metrics().files_discovered.inc_by(files.len() as u64);
        info!(
            root = %self.root.display(),
            files = files.len(),
            max_concurrent_files = self.max_concurrent_files,
            "Starting migration"
        );

        let mut summary = RunSummary::new(files.len());

        let (error_tx, mut error_rx) = mpsc::unbounded_channel();
        let (merged_tx, merged_rx) = mpsc::channel(MERGE_QUEUE_CAPACITY);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(OUTCOME_QUEUE_CAPACITY);

        let dispatcher = tokio::spawn(dispatch(
            self.extractor.clone(),
            files,
            ConcurrencyLimiter::new(self.max_concurrent_files),
            merged_tx,
            error_tx,
        ));

        let sending = sink.send(merged_rx, outcome_tx);
        tokio::pin!(sending);

        let report = loop {
            tokio::select! {
                report = &mut sending => break report,
                Some(outcome) = outcome_rx.recv() => summary.record_outcome(outcome),
                Some(e) = error_rx.recv() => summary.record_error(e),
            }
        };

        let report = match report {
            Ok(report) => report,
            Err(e) => {
                dispatcher.abort();
                return Err(e);
            }
        };

        while let Some(outcome) = outcome_rx.recv().await {
            summary.record_outcome(outcome);
        }

        summary.peak_concurrent_files = dispatcher
            .await
            .map_err(|e| Error::internal(format!("dispatcher failed: {}", e)))??;

        while let Some(e) = error_rx.recv().await {
            summary.record_error(e);
        }

        summary.finish(started.elapsed());
        debug!(
            points_received = report.points_received,
            batches = report.batches,
            points_discarded = report.points_discarded,
            "Sink report"
        );
        Ok(summary)
    }
}

/// Start one extraction per file, at most `limiter.max()` at a time, and
/// forward every point into the merged queue.
///
/// Returns the highest number of files that were in flight at once.
async fn dispatch(
    extractor: Arc<FileExtractor>,
    files: Vec<PathBuf>,
    limiter: ConcurrencyLimiter,
    merged: mpsc::Sender<OutputPoint>,
    errors: mpsc::UnboundedSender<Error>,
) -> Result<usize> {
    let mut forwarders = JoinSet::new();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let mut peak = 0usize;

    for path in files {
        let permit = limiter.acquire().await?;
        peak = peak.max(in_flight.fetch_add(1, Ordering::SeqCst) + 1);
        let mut points = extractor.extract(path, errors.clone());
        let merged = merged.clone();
        let in_flight = in_flight.clone();

        forwarders.spawn(async move {
            while let Some(point) = points.recv().await {
                if merged.send(point).await.is_err() {
                    break;
                }
            }
            // Counted out before the file's slot is released.
            in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        });

        while let Some(joined) = forwarders.try_join_next() {
            report_forwarder(joined, &errors);
        }
    }
    drop(merged);

    while let Some(joined) = forwarders.join_next().await {
        report_forwarder(joined, &errors);
    }
    Ok(peak)
}

fn report_forwarder(
    joined: std::result::Result<(), tokio::task::JoinError>,
    errors: &mpsc::UnboundedSender<Error>,
) {
    if let Err(e) = joined {
        error!(error = %e, "Forwarder task failed");
        let _ = errors.send(Error::internal(format!("forwarder task failed: {}", e)));
    }
}
