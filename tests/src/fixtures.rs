//! Whisper trees and rule sets for tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use migrate_core::{ConversionRule, Field, OutputPoint, RuleSet, TagTemplate};
use tempfile::TempDir;
use whisper_archive::{create, AggregationMethod, Header, Sample};

/// First timestamp written by [`WhisperTree::add_series`].
pub const BASE_TIMESTAMP: u32 = 1_700_000_000;

/// A whisper directory in a temporary location.
pub struct WhisperTree {
    dir: TempDir,
}

impl WhisperTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn prepare(&self, relative: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directories");
        }
        path
    }

    /// Write a whisper file with the given `(seconds_per_point, points)`
    /// archives and their leading samples.
    pub fn add(&self, relative: &str, archives: &[(u32, u32)], samples: &[Vec<Sample>]) -> PathBuf {
        let path = self.prepare(relative);
        let header = Header::new(AggregationMethod::Average, 0.5, archives);
        create(&path, &header, samples).expect("Failed to write whisper file");
        path
    }

    /// Write a single one-minute archive holding `points` samples followed
    /// by two unused slots.
    pub fn add_series(&self, relative: &str, points: u32) -> PathBuf {
        self.add(relative, &[(60, points + 2)], &[minute_samples(points)])
    }

    /// Write arbitrary bytes.
    pub fn add_raw(&self, relative: &str, data: &[u8]) -> PathBuf {
        let path = self.prepare(relative);
        std::fs::write(&path, data).expect("Failed to write file");
        path
    }
}

impl Default for WhisperTree {
    fn default() -> Self {
        Self::new()
    }
}

/// `n` samples one minute apart starting at [`BASE_TIMESTAMP`], valued 0..n.
pub fn minute_samples(n: u32) -> Vec<Sample> {
    (0..n)
        .map(|i| Sample::new(BASE_TIMESTAMP + i * 60, f64::from(i)))
        .collect()
}

pub fn tag(key: &str, value: &str) -> TagTemplate {
    TagTemplate {
        key: key.into(),
        value: value.into(),
    }
}

/// `servers.<host>.<metric>` → measurement `<metric>`, tag `host`, field `value`.
pub fn server_rule() -> ConversionRule {
    ConversionRule::new(
        r"servers\.(?P<host>[^.]+)\.(?P<metric>[^.]+)",
        "?metric",
        vec![tag("host", "?host")],
        "value",
    )
}

pub fn server_rules() -> Arc<RuleSet> {
    Arc::new(RuleSet::new(vec![server_rule()]))
}

/// A point for sink tests.
pub fn output_point(policy: &str, timestamp: i64) -> OutputPoint {
    OutputPoint {
        measurement: "cpu".into(),
        retention_policy: policy.into(),
        tags: Vec::new().into(),
        field: Field {
            key: "value".into(),
            value: timestamp as f64,
        },
        timestamp,
    }
}
