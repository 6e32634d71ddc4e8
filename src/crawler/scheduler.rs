//! Task queues for the crawl frontier
//!
//! This module provides:
//! - The [`TaskQueue`] trait shared by all queueing policies
//! - [`DedupQueue`]: FIFO that drops tasks whose URL is already queued
//! - [`FifoQueue`]: FIFO with no deduplication, optionally bounded
//!
//! Every queue accepts pushes from many task units at once and pops from the
//! single control loop. A full queue never blocks a thread: `try_push` hands
//! the task back, and `push` suspends the calling task until a pop frees a
//! slot.

use crate::config::QueuePolicy;
use crate::task::FetchTask;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Dedup key: SHA-256 of the task URL
pub type DedupKey = [u8; 32];

/// A queueing policy for pending fetch tasks
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Adds a task to the back of the queue if there is room
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The task was queued, or dropped by the policy
    /// * `Err(task)` - The queue is full; the task is handed back
    fn try_push(&self, task: FetchTask) -> Result<(), FetchTask>;

    /// Adds a task, waiting for room if the queue is bounded and full
    ///
    /// The default suits queues that are never full.
    async fn push(&self, task: FetchTask) {
        if let Err(task) = self.try_push(task) {
            tracing::warn!("Task queue rejected {}", task.url());
        }
    }

    /// Removes and returns the oldest task, or `None` if the queue is empty
    ///
    /// Never waits for a task to arrive.
    fn pop(&self) -> Option<FetchTask>;

    /// Number of queued tasks at the moment of the call
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Builds the queue selected by `policy`
///
/// `capacity` bounds the plain queue only; the dedup queue is unbounded.
pub fn build_queue(policy: QueuePolicy, capacity: Option<usize>) -> Box<dyn TaskQueue> {
    match policy {
        QueuePolicy::Dedup => Box::new(DedupQueue::new()),
        QueuePolicy::Plain => match capacity {
            Some(capacity) => Box::new(FifoQueue::with_capacity(capacity)),
            None => Box::new(FifoQueue::unbounded()),
        },
    }
}

/// Computes the dedup key of a task
///
/// Only the URL contributes. Two tasks that differ in method, body or headers
/// but share a URL get the same key.
pub fn dedup_key(task: &FetchTask) -> DedupKey {
    Sha256::digest(task.url().as_bytes()).into()
}

/// Queue contents and dedup index, guarded together
#[derive(Default)]
struct DedupState {
    queue: VecDeque<FetchTask>,
    keys: HashSet<DedupKey>,
}

/// FIFO queue that suppresses duplicate URLs
///
/// A URL is considered a duplicate only while it sits in the queue. Once
/// popped, the same URL may be pushed again.
#[derive(Default)]
pub struct DedupQueue {
    state: Mutex<DedupState>,
}

impl DedupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DedupState> {
        // The state stays consistent even if a holder panicked: every mutation
        // updates queue and keys together before releasing.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TaskQueue for DedupQueue {
    fn try_push(&self, task: FetchTask) -> Result<(), FetchTask> {
        let key = dedup_key(&task);
        let mut state = self.lock();

        if !state.keys.insert(key) {
            tracing::trace!("Dropping duplicate task {}", task.url());
            return Ok(());
        }

        state.queue.push_back(task);
        Ok(())
    }

    fn pop(&self) -> Option<FetchTask> {
        let mut state = self.lock();
        let task = state.queue.pop_front()?;
        state.keys.remove(&dedup_key(&task));
        Some(task)
    }

    fn size(&self) -> usize {
        self.lock().queue.len()
    }
}

/// FIFO queue without deduplication
///
/// Unbounded by default. A bounded queue tracks free slots with a semaphore:
/// a push takes a slot before the task is stored and a pop gives it back.
pub struct FifoQueue {
    tasks: Mutex<VecDeque<FetchTask>>,
    slots: Option<Semaphore>,
    capacity: Option<usize>,
}

impl FifoQueue {
    pub fn unbounded() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            slots: None,
            capacity: None,
        }
    }

    /// Creates a queue holding at most `capacity` tasks (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            tasks: Mutex::new(VecDeque::with_capacity(capacity)),
            slots: Some(Semaphore::new(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Maximum number of queued tasks, `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<FetchTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FifoQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[async_trait]
impl TaskQueue for FifoQueue {
    fn try_push(&self, task: FetchTask) -> Result<(), FetchTask> {
        if let Some(slots) = &self.slots {
            match slots.try_acquire() {
                Ok(slot) => slot.forget(),
                Err(_) => return Err(task),
            }
        }
        self.lock().push_back(task);
        Ok(())
    }

    async fn push(&self, task: FetchTask) {
        if let Some(slots) = &self.slots {
            match slots.acquire().await {
                Ok(slot) => slot.forget(),
                Err(e) => {
                    tracing::error!("Task queue closed, dropping {}: {}", task.url(), e);
                    return;
                }
            }
        }
        self.lock().push_back(task);
    }

    fn pop(&self) -> Option<FetchTask> {
        let task = self.lock().pop_front()?;
        if let Some(slots) = &self.slots {
            slots.add_permits(1);
        }
        Some(task)
    }

    fn size(&self) -> usize {
        self.lock().len()
    }
}
