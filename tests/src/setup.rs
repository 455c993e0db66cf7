//! Common test setup functions.

use std::sync::Arc;
use std::time::Duration;

use migrate_core::{OutputPoint, Result, RuleSet};
use migrate_pipeline::{
    BatchingSink, Migration, MigrationConfig, RetryPolicy, RunSummary, SinkConfig, SinkReport,
    WriteResult,
};
use tokio::sync::mpsc;

use crate::fixtures::{server_rules, WhisperTree};
use crate::mocks::MockWriter;

/// Retry schedule short enough for tests.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(1), max_retries)
}

/// Sink settings with fast retries.
pub fn test_sink_config() -> SinkConfig {
    SinkConfig {
        batch_size: 100,
        write_concurrency: 4,
        retry: fast_retry(3),
        ..Default::default()
    }
}

/// Test context with a temporary whisper tree and a mock writer.
///
/// Runs the real extraction, batching and retry code; only the network
/// write is replaced.
pub struct TestContext {
    pub tree: WhisperTree,
    pub writer: MockWriter,
    pub rules: Arc<RuleSet>,
    pub migration: MigrationConfig,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            tree: WhisperTree::new(),
            writer: MockWriter::new(),
            rules: server_rules(),
            migration: MigrationConfig {
                max_concurrent_files: 4,
                ..Default::default()
            },
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    /// A sink writing to this context's mock writer.
    pub fn sink(&self, config: SinkConfig) -> BatchingSink {
        BatchingSink::new(Arc::new(self.writer.clone()), config)
    }

    /// Migrate the tree through `sink`.
    pub async fn run(&self, sink: &BatchingSink) -> Result<RunSummary> {
        Migration::new(self.rules.clone(), self.tree.root(), &self.migration)
            .run(sink)
            .await
    }

    /// Migrate the tree with [`test_sink_config`].
    pub async fn migrate(&self) -> RunSummary {
        let sink = self.sink(test_sink_config());
        self.run(&sink).await.expect("Migration failed")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Feed `points` through `sink`, collecting every outcome.
pub async fn run_sink(
    sink: &BatchingSink,
    points: Vec<OutputPoint>,
) -> (SinkReport, Vec<Result<WriteResult>>) {
    let (tx, rx) = mpsc::channel(16);
    let (outcome_tx, mut outcome_rx) = mpsc::channel(16);

    let producer = tokio::spawn(async move {
        for point in points {
            if tx.send(point).await.is_err() {
                break;
            }
        }
    });
    let collector = tokio::spawn(async move {
        let mut outcomes = Vec::new();
        while let Some(outcome) = outcome_rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    });

    let report = sink.send(rx, outcome_tx).await.expect("Sink failed");
    producer.await.expect("Producer panicked");
    let outcomes = collector.await.expect("Collector panicked");
    (report, outcomes)
}
