//! Mock implementations for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use influx_client::{PointWriter, TargetAdmin, WriteResponse};
use migrate_core::{Error, OutputPoint, Result};
use parking_lot::Mutex;

/// Latency reported for accepted writes.
pub const SUCCESS_LATENCY: Duration = Duration::from_millis(5);

/// Latency reported for rejected writes.
pub const FAILURE_LATENCY: Duration = Duration::from_millis(750);

/// A write the mock accepted.
#[derive(Debug, Clone)]
pub struct CapturedWrite {
    pub policy: String,
    pub points: Vec<OutputPoint>,
}

/// Mock writer that captures accepted batches in memory.
///
/// Implements the same `PointWriter` trait as `InfluxClient`. Failures can
/// be injected for the next N attempts or permanently, either as an HTTP
/// status or, with status 0, as a transport error.
#[derive(Clone)]
pub struct MockWriter {
    writes: Arc<Mutex<Vec<CapturedWrite>>>,
    attempts: Arc<AtomicUsize>,
    fail_next: Arc<Mutex<u32>>,
    should_fail: Arc<Mutex<bool>>,
    failure_status: Arc<Mutex<u16>>,
    delay: Arc<Mutex<Duration>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockWriter {
    pub fn new() -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            fail_next: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
            failure_status: Arc::new(Mutex::new(500)),
            delay: Arc::new(Mutex::new(Duration::ZERO)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all accepted writes.
    pub fn captured_writes(&self) -> Vec<CapturedWrite> {
        self.writes.lock().clone()
    }

    /// Get every accepted point.
    pub fn captured_points(&self) -> Vec<OutputPoint> {
        self.writes
            .lock()
            .iter()
            .flat_map(|w| w.points.iter().cloned())
            .collect()
    }

    pub fn point_count(&self) -> usize {
        self.writes.lock().iter().map(|w| w.points.len()).sum()
    }

    /// Attempts made, accepted or not.
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Highest number of writes seen in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Reject the next `n` attempts.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock() = n;
    }

    /// Reject every attempt until reset.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    /// Status returned for rejected attempts; 0 simulates a transport error.
    pub fn set_failure_status(&self, status: u16) {
        *self.failure_status.lock() = status;
    }

    /// Hold every attempt for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    fn take_failure(&self) -> bool {
        let mut remaining = self.fail_next.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return true;
        }
        *self.should_fail.lock()
    }
}

impl Default for MockWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PointWriter for MockWriter {
    async fn write_points(
        &self,
        retention_policy: &str,
        points: &[OutputPoint],
    ) -> Result<WriteResponse> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.take_failure() {
            let status = *self.failure_status.lock();
            if status == 0 {
                return Err(Error::sink("Mock transport failure"));
            }
            return Ok(WriteResponse {
                status,
                elapsed: FAILURE_LATENCY,
                body: "mock failure".to_string(),
            });
        }

        self.writes.lock().push(CapturedWrite {
            policy: retention_policy.to_string(),
            points: points.to_vec(),
        });
        Ok(WriteResponse {
            status: 204,
            elapsed: SUCCESS_LATENCY,
            body: String::new(),
        })
    }
}

/// Mock admin that records statements.
#[derive(Clone, Default)]
pub struct MockAdmin {
    statements: Arc<Mutex<Vec<String>>>,
    fail_on: Arc<Mutex<Option<String>>>,
}

impl MockAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    /// Fail statements starting with `prefix`.
    pub fn fail_on(&self, prefix: impl Into<String>) {
        *self.fail_on.lock() = Some(prefix.into());
    }
}

#[async_trait]
impl TargetAdmin for MockAdmin {
    async fn execute(&self, statement: &str) -> Result<()> {
        if let Some(prefix) = self.fail_on.lock().as_deref() {
            if statement.starts_with(prefix) {
                return Err(Error::sink(format!("Mock admin failure: {}", statement)));
            }
        }
        self.statements.lock().push(statement.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::output_point;

    #[tokio::test]
    async fn test_mock_writer_captures_writes() {
        let mock = MockWriter::new();
        let response = mock
            .write_points("1d", &[output_point("1d", 60), output_point("1d", 120)])
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(mock.point_count(), 2);
        assert_eq!(mock.captured_writes()[0].policy, "1d");
    }

    #[tokio::test]
    async fn test_mock_writer_failure_modes() {
        let mock = MockWriter::new();
        mock.fail_next(1);
        let rejected = mock.write_points("", &[output_point("1d", 60)]).await.unwrap();
        assert_eq!(rejected.status, 500);

        mock.set_failure_status(0);
        mock.set_should_fail(true);
        assert!(mock.write_points("", &[]).await.is_err());
        assert_eq!(mock.attempt_count(), 2);
        assert_eq!(mock.point_count(), 0);
    }
}
