//! Source and output point definitions.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::limits::SENTINEL_TIMESTAMP;
use crate::retention::retention_policy_name;
use crate::rules::MatchStub;

/// A single tag on an output point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The single field carried by an output point.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: Arc<str>,
    pub value: f64,
}

/// A raw sample read from a whisper archive.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePoint {
    pub series_key: Arc<str>,
    /// Total time span covered by the originating archive.
    pub retention: Duration,
    pub value: f64,
    /// Epoch seconds. Zero marks an unused archive slot.
    pub timestamp: i64,
}

impl SourcePoint {
    /// Whether this sample is an unused slot that must be discarded.
    pub fn is_sentinel(&self) -> bool {
        self.timestamp == SENTINEL_TIMESTAMP
    }

    /// NaN and infinities have no line-protocol representation.
    pub fn has_finite_value(&self) -> bool {
        self.value.is_finite()
    }
}

/// A point ready to be written to the target.
///
/// String parts are shared with the stub that produced them, so cloning a
/// point does not copy its series description.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPoint {
    pub measurement: Arc<str>,
    pub retention_policy: Arc<str>,
    pub tags: Arc<[Tag]>,
    pub field: Field,
    /// Epoch seconds.
    pub timestamp: i64,
}

/// Apply a resolved stub to one source sample.
pub fn transform(stub: &MatchStub, source: &SourcePoint) -> OutputPoint {
    OutputPoint {
        measurement: stub.measurement.clone(),
        retention_policy: retention_policy_name(source.retention).into(),
        tags: stub.tags.clone(),
        field: Field {
            key: stub.field_key.clone(),
            value: source.value,
        },
        timestamp: source.timestamp,
    }
}
