//! Queue sizes and defaults for the migration pipeline.
//!
//! Queues are bounded so that a slow sink applies backpressure all the way
//! back to file extraction instead of buffering whole archives in memory.

/// Whisper archive file suffix.
pub const ARCHIVE_SUFFIX: &str = ".wsp";

/// Per-file output queue capacity (points).
///
/// Sized to hold one default batch plus headroom.
pub const FILE_QUEUE_CAPACITY: usize = 15_000;

/// Merged point queue capacity (points).
pub const MERGE_QUEUE_CAPACITY: usize = 15_000;

/// Write outcome queue capacity.
pub const OUTCOME_QUEUE_CAPACITY: usize = 64;

/// Default points per write request.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default number of in-flight write requests.
pub const DEFAULT_WRITE_CONCURRENCY: usize = 4;

/// Default number of files extracted at once.
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 64;

/// First retry delay in milliseconds.
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;

/// Added to the retry delay on every further retry, in milliseconds.
pub const DEFAULT_RETRY_INCREMENT_MS: u64 = 500;

/// Retries per batch before it is reported as failed (0 = unlimited).
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// HTTP status that counts as a successful write.
pub const WRITE_SUCCESS_STATUS: u16 = 204;

/// Timestamp of a whisper slot that was never written.
pub const SENTINEL_TIMESTAMP: i64 = 0;

/// Shortest retention policy duration InfluxDB accepts.
pub const MIN_POLICY_DURATION_SECS: u64 = 3600;
