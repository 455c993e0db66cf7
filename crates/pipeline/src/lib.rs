//! Migration pipeline: discovery, extraction, batching and writes.
//!
//! ```text
//! files ──► FileExtractor (≤ max_concurrent_files) ──► merge ──► BatchingSink ──► PointWriter
//!                                                                     │
//!                                         RunSummary ◄── outcomes ◄───┘
//! ```

pub mod admin;
pub mod batch;
pub mod config;
pub mod discovery;
pub mod extractor;
pub mod limiter;
pub mod migration;
pub mod retry;
pub mod sink;
pub mod summary;

pub use admin::prepare_target;
pub use batch::{Batch, BatchSet};
pub use config::MigrationConfig;
pub use discovery::find_archive_files;
pub use extractor::FileExtractor;
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use migration::Migration;
pub use retry::RetryPolicy;
pub use sink::{BatchingSink, SinkConfig, SinkReport, WriteResult};
pub use summary::RunSummary;
