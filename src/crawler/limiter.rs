//! Worker-pool admission control
//!
//! [`ConcurrencyLimiter`] bounds the number of task units in flight. The
//! control loop acquires a [`WorkerPermit`] before spawning each unit, and the
//! unit gives it back when it finishes.

use crate::ArachneError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting semaphore of fixed capacity
///
/// `in_use() + available() == capacity()` holds at all times.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A reserved worker slot, released on drop
#[derive(Debug)]
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
}

impl WorkerPermit {
    /// Frees the slot now rather than at end of scope
    pub fn release(self) {}
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `capacity` slots (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot and reserves it
    ///
    /// Waiters are served in FIFO order.
    pub async fn acquire(&self) -> Result<WorkerPermit, ArachneError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ArachneError::LimiterClosed)?;
        Ok(WorkerPermit { _permit: permit })
    }

    /// Reserves a slot only if one is free right now
    pub fn try_acquire(&self) -> Option<WorkerPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| WorkerPermit { _permit: permit })
    }

    /// Gives a slot back
    pub fn release(&self, permit: WorkerPermit) {
        permit.release();
    }

    /// Number of slots currently reserved
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
