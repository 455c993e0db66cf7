//! Bounded admission for concurrent work.

use std::sync::Arc;

use migrate_core::{Error, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admits at most `max` holders at a time.
///
/// Cloning yields another handle to the same slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// A held slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Creates a limiter; `max` is clamped to at least 1.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Waits until a slot is free and takes it.
    pub async fn acquire(&self) -> Result<LimiterPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::internal("concurrency limiter closed"))?;
        Ok(LimiterPermit { _permit: permit })
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.max - self.available()
    }
}
