//! Progress metrics and log setup for whisper-migrate.
//!
//! Metrics are plain atomics in a process-wide registry. They are logged
//! periodically while a migration runs and once more when it finishes.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
