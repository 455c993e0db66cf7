//! Unified error types for the migration pipeline.
//!
//! Errors fall into the classes below. Fatal classes abort a run before any
//! point is written; every other class is collected into the run summary.
//! - CFG: Configuration errors (fatal)
//! - MATCH: Rule matching errors (series skipped)
//! - EXTRACT: Source file errors (file skipped)
//! - SINK: Write errors (retried, then reported)
//! - WALK: Discovery errors (fatal)

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Configuration,
    Matching,
    Extraction,
    Sink,
    Discovery,
    Internal,
}

impl ErrorClass {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration => "CFG",
            Self::Matching => "MATCH",
            Self::Extraction => "EXTRACT",
            Self::Sink => "SINK",
            Self::Discovery => "WALK",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether an error of this class ends the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration | Self::Discovery)
    }
}

/// Unified error type for the migration pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("aborted: {0}")]
    Aborted(String),

    /// No rule matched the series key.
    #[error("no rule matched series {key:?}")]
    NoMatch { key: String },

    /// A rule could not be applied to a series key.
    #[error("invalid rule {pattern:?} for series {key:?}: {reason}")]
    InvalidRule {
        pattern: String,
        key: String,
        reason: String,
    },

    #[error("failed to extract {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    #[error("failed to walk {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A batch could not be written after exhausting its retries.
    #[error("write of {points} points to retention policy {policy:?} failed after {attempts} attempts: {message}")]
    Write {
        policy: String,
        points: usize,
        attempts: u32,
        message: String,
    },

    #[error("sink error: {0}")]
    Sink(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::Aborted(msg.into())
    }

    pub fn no_match(key: impl Into<String>) -> Self {
        Self::NoMatch { key: key.into() }
    }

    pub fn invalid_rule(
        pattern: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRule {
            pattern: pattern.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn extraction(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::Aborted(_) => ErrorClass::Configuration,
            Self::NoMatch { .. } | Self::InvalidRule { .. } => ErrorClass::Matching,
            Self::Extraction { .. } => ErrorClass::Extraction,
            Self::Discovery { .. } => ErrorClass::Discovery,
            Self::Write { .. } | Self::Sink(_) => ErrorClass::Sink,
            Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        self.class().code()
    }

    pub fn is_fatal(&self) -> bool {
        self.class().is_fatal()
    }
}
