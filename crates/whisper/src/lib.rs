//! Graphite whisper archive reader for whisper-migrate.
//!
//! Only the parts of the format needed for migration are implemented: header
//! decoding and full archive dumps. [`format::encode`] writes files in the
//! same layout for tests and fixtures.

pub mod error;
pub mod format;
pub mod reader;

pub use error::{Result, WhisperError};
pub use format::{AggregationMethod, ArchiveInfo, Header, Metadata, Sample};
pub use reader::*;
