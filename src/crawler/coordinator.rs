//! Engine - main crawl orchestration logic
//!
//! This module contains the control loop that coordinates all aspects of a
//! run, including:
//! - Polling the task queue and detecting completion
//! - Bounding in-flight work with the concurrency limiter
//! - Running each task through fetch, extraction and the sinks
//! - Catching fetcher, extractor and sink faults so one bad task can't stop
//!   the run
//! - Holding back completion while pushes wait for room in a bounded queue

use crate::config::{Config, EngineConfig};
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::limiter::{ConcurrencyLimiter, WorkerPermit};
use crate::crawler::retry::{DelayPolicy, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::crawler::scheduler::{build_queue, FifoQueue, TaskQueue};
use crate::output::{CollectSink, EngineStats, RunStats, Sink};
use crate::task::{ContentKind, ExtractedRecord, FetchResult, FetchTask};
use crate::ArachneError;
use chrono::Utc;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::Instrument;

/// Lifecycle of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, not yet running
    Idle,

    /// Control loop is dispatching tasks
    Draining,

    /// Control loop has returned
    Terminated,
}

/// Cloneable handle given to sinks
///
/// Lets a sink queue more work and read the engine name without holding the
/// engine itself.
#[derive(Clone)]
pub struct EngineHandle {
    name: Arc<str>,
    queue: Arc<dyn TaskQueue>,
    waiting: Arc<AtomicUsize>,
}

impl EngineHandle {
    fn new(name: Arc<str>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            name,
            queue,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a handle backed by its own queue, not attached to any engine
    ///
    /// Useful for driving a sink outside of a run.
    pub fn detached(name: &str) -> Self {
        Self::new(Arc::from(name), Arc::new(FifoQueue::unbounded()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues a task without waiting
    ///
    /// Tasks with an empty URL are dropped, and so are tasks that find a
    /// bounded queue full. Both are logged.
    ///
    /// # Returns
    ///
    /// `true` if the task was handed to the queue
    pub fn add_task(&self, task: FetchTask) -> bool {
        if task.url().is_empty() {
            tracing::warn!("Ignoring task with empty url");
            return false;
        }
        match self.queue.try_push(task) {
            Ok(()) => true,
            Err(task) => {
                tracing::warn!("Task queue full, dropping {}", task.url());
                false
            }
        }
    }

    pub fn add_url(&self, url: impl Into<String>, kind: impl Into<ContentKind>) -> bool {
        self.add_task(FetchTask::new(url, kind))
    }

    /// Queues a task, waiting for room if the queue is full
    ///
    /// A running engine does not finish while the push is waiting.
    pub async fn push_task(&self, task: FetchTask) -> bool {
        let offered = self.offer(std::iter::once(task));
        let accepted = offered.queued + offered.overflow.len() > 0;
        self.push_waiting(offered.overflow, offered.waiting).await;
        accepted
    }

    /// Number of tasks waiting in the queue
    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    /// Pushes that are still waiting for room in the queue
    fn waiting_pushes(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Queues every task that fits now, keeping the rest in order
    ///
    /// Once one task finds the queue full, the ones after it are held back
    /// too. The held-back tasks are counted as waiting before this returns.
    fn offer(&self, tasks: impl IntoIterator<Item = FetchTask>) -> Offered {
        let mut queued = 0;
        let mut overflow = Vec::new();

        for task in tasks {
            if task.url().is_empty() {
                tracing::warn!("Ignoring task with empty url");
                continue;
            }
            if !overflow.is_empty() {
                overflow.push(task);
                continue;
            }
            match self.queue.try_push(task) {
                Ok(()) => queued += 1,
                Err(task) => overflow.push(task),
            }
        }

        let waiting = WaitingPushes::new(&self.waiting, overflow.len());
        Offered {
            queued,
            overflow,
            waiting,
        }
    }

    async fn push_waiting(&self, tasks: Vec<FetchTask>, waiting: WaitingPushes) {
        if !tasks.is_empty() {
            tracing::debug!("Queue full, waiting to push {} task(s)", tasks.len());
        }
        for task in tasks {
            self.queue.push(task).await;
        }
        drop(waiting);
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("name", &self.name)
            .field("queued", &self.queue.size())
            .field("waiting", &self.waiting_pushes())
            .finish()
    }
}

/// Result of [`EngineHandle::offer`]
struct Offered {
    queued: usize,
    overflow: Vec<FetchTask>,
    waiting: WaitingPushes,
}

/// Counts pushes waiting for queue room until dropped
struct WaitingPushes {
    counter: Arc<AtomicUsize>,
    count: usize,
}

impl WaitingPushes {
    fn new(counter: &Arc<AtomicUsize>, count: usize) -> Self {
        counter.fetch_add(count, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
            count,
        }
    }
}

impl Drop for WaitingPushes {
    fn drop(&mut self) {
        self.counter.fetch_sub(self.count, Ordering::SeqCst);
    }
}

/// Main engine structure
///
/// Wires a queue, a fetcher, an extractor and a list of sinks together and
/// runs them under a bounded worker pool.
pub struct Engine {
    config: EngineConfig,
    handle: EngineHandle,
    extractor: Arc<dyn Extractor>,
    fetcher: Arc<dyn Fetcher>,
    sinks: Vec<Arc<dyn Sink>>,
    retry: RetryPolicy,
    state: Mutex<EngineState>,
}

impl Engine {
    /// Creates a new engine instance
    ///
    /// # Arguments
    ///
    /// * `config` - The engine configuration
    /// * `extractor` - Field-parsing logic applied to every successful fetch
    ///
    /// # Returns
    ///
    /// * `Ok(Engine)` - Successfully created engine
    /// * `Err(ArachneError)` - The HTTP client could not be built
    pub fn new(config: &Config, extractor: impl Extractor + 'static) -> Result<Self, ArachneError> {
        let fetcher = HttpFetcher::new(&config.http)?;
        let queue: Arc<dyn TaskQueue> =
            Arc::from(build_queue(config.engine.queue, config.engine.queue_capacity));
        let name: Arc<str> = Arc::from(config.engine.name.as_str());

        Ok(Self {
            config: config.engine.clone(),
            handle: EngineHandle::new(name, queue),
            extractor: Arc::new(extractor),
            fetcher: Arc::new(fetcher),
            sinks: Vec::new(),
            retry: RetryPolicy::new(DEFAULT_MAX_ATTEMPTS, DelayPolicy::from(&config.delay)),
            state: Mutex::new(EngineState::Idle),
        })
    }

    /// Replaces the HTTP fetcher
    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    /// Replaces the task queue; tasks already queued are discarded
    pub fn with_queue(mut self, queue: impl TaskQueue + 'static) -> Self {
        self.handle = EngineHandle::new(Arc::clone(&self.handle.name), Arc::new(queue));
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Registers a sink; sinks run in registration order
    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) -> &mut Self {
        self.sinks.push(sink);
        self
    }

    pub fn set_worker_count(&mut self, worker_count: usize) -> &mut Self {
        self.config.worker_count = worker_count;
        self
    }

    pub fn set_exit_on_completion(&mut self, exit: bool) -> &mut Self {
        self.config.exit_on_completion = exit;
        self
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Worker slots the next run will use
    pub fn worker_count(&self) -> usize {
        self.config.worker_count.max(1)
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Queues a task; see [`EngineHandle::add_task`]
    pub fn add_task(&self, task: FetchTask) -> bool {
        self.handle.add_task(task)
    }

    /// Queues a task, waiting for room; see [`EngineHandle::push_task`]
    pub async fn push_task(&self, task: FetchTask) -> bool {
        self.handle.push_task(task).await
    }

    pub fn add_url(&self, url: impl Into<String>, kind: impl Into<ContentKind>) -> bool {
        self.handle.add_url(url, kind)
    }

    /// Queues several tasks without waiting, returning how many were accepted
    pub fn add_tasks(&self, tasks: impl IntoIterator<Item = FetchTask>) -> usize {
        tasks
            .into_iter()
            .map(|task| self.add_task(task))
            .filter(|accepted| *accepted)
            .count()
    }

    pub fn queue_size(&self) -> usize {
        self.handle.queue_size()
    }

    /// Runs the control loop
    ///
    /// Returns once the queue is empty and no task unit is in flight, if
    /// exit-on-completion is set. Otherwise keeps polling forever.
    ///
    /// # Returns
    ///
    /// Counters and timestamps for the run. Task failures never surface as
    /// errors here; they are logged and counted.
    pub async fn run(&self) -> RunStats {
        let span = tracing::info_span!("engine", name = %self.name());
        self.run_loop().instrument(span).await
    }

    /// Seeds the queue with `tasks` and runs the control loop
    ///
    /// Seeds that don't fit in a bounded queue are pushed as the run frees
    /// room, so none are dropped.
    pub async fn run_with(&self, tasks: impl IntoIterator<Item = FetchTask>) -> RunStats {
        let offered = self.handle.offer(tasks);
        let seeding = self.handle.push_waiting(offered.overflow, offered.waiting);
        let (stats, ()) = tokio::join!(self.run(), seeding);
        stats
    }

    async fn run_loop(&self) -> RunStats {
        let started_at = Utc::now();
        let limiter = ConcurrencyLimiter::new(self.config.worker_count);
        let stats = Arc::new(EngineStats::new());
        let idle_interval = Duration::from_millis(self.config.idle_interval_ms.max(1));
        let unit = Arc::new(UnitContext {
            handle: self.handle.clone(),
            extractor: Arc::clone(&self.extractor),
            fetcher: Arc::clone(&self.fetcher),
            sinks: self.sinks.clone(),
            retry: self.retry.clone(),
            stats: Arc::clone(&stats),
        });

        self.set_state(EngineState::Draining);
        tracing::info!(
            "Engine started: {} worker(s), {} task(s) queued",
            limiter.capacity(),
            self.queue_size()
        );

        loop {
            // Snapshot before popping: a unit that is still running, or a push
            // waiting for room, may add tasks, so an empty pop only means
            // "done" if neither existed beforehand.
            let was_idle = limiter.in_use() == 0 && self.handle.waiting_pushes() == 0;

            let Some(task) = self.handle.queue.pop() else {
                if was_idle && self.config.exit_on_completion {
                    break;
                }
                tokio::time::sleep(idle_interval).await;
                continue;
            };

            let permit = match limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!("Stopping engine: {}", e);
                    break;
                }
            };

            stats.record_dispatch();
            let span = tracing::info_span!("unit", url = %task.url());
            tokio::spawn(run_unit(Arc::clone(&unit), task, permit).instrument(span));
        }

        let run = stats.snapshot(started_at, Utc::now());
        self.set_state(EngineState::Terminated);
        tracing::info!(
            "Engine finished: {} dispatched, {} succeeded, {} failed, {} record(s) emitted in {:.1}s",
            run.dispatched,
            run.succeeded,
            run.failed,
            run.records_emitted,
            run.duration_seconds()
        );
        run
    }

    /// Runs `tasks` to completion and returns every emitted record
    ///
    /// Forces exit-on-completion. Records come back in the order units
    /// finished, which is not necessarily the order of `tasks`.
    pub async fn collect(mut self, tasks: impl IntoIterator<Item = FetchTask>) -> Vec<ExtractedRecord> {
        let collector = Arc::new(CollectSink::new());
        self.config.exit_on_completion = true;
        self.sinks.push(Arc::clone(&collector) as Arc<dyn Sink>);

        self.run_with(tasks).await;
        collector.collected()
    }

    /// Runs a single task and returns its record, if one was emitted
    pub async fn collect_one(self, task: FetchTask) -> Option<ExtractedRecord> {
        self.collect(std::iter::once(task)).await.into_iter().next()
    }
}

/// Everything a task unit needs, shared by all units of a run
struct UnitContext {
    handle: EngineHandle,
    extractor: Arc<dyn Extractor>,
    fetcher: Arc<dyn Fetcher>,
    sinks: Vec<Arc<dyn Sink>>,
    retry: RetryPolicy,
    stats: Arc<EngineStats>,
}

/// Processes one task; the permit is held until the task is done
///
/// Follow-ons that found the queue full are pushed after the permit is
/// released, so a full queue never pins a worker slot.
async fn run_unit(unit: Arc<UnitContext>, task: FetchTask, permit: WorkerPermit) {
    let url = task.url().to_string();
    let offered = match AssertUnwindSafe(unit.fetch_and_process(task)).catch_unwind().await {
        Ok(offered) => offered,
        Err(panic) => {
            unit.stats.record_unit_panic();
            tracing::error!("Task unit for {} panicked: {}", url, panic_message(&*panic));
            None
        }
    };

    let handle = unit.handle.clone();
    // Nothing the unit holds may outlive its slot.
    drop(unit);
    permit.release();

    if let Some(offered) = offered {
        handle.push_waiting(offered.overflow, offered.waiting).await;
    }
}

impl UnitContext {
    async fn fetch_and_process(&self, task: FetchTask) -> Option<Offered> {
        let task = Arc::new(task);
        let outcome = self.retry.run(self.fetcher.as_ref(), Arc::clone(&task)).await;
        let success = outcome.result.is_success();
        self.stats.record_fetch(outcome.attempts, success);

        if !success {
            tracing::warn!(
                "Abandoning {} after {} attempt(s): {}",
                task.url(),
                outcome.attempts,
                outcome.result.error_message()
            );
            return None;
        }

        tracing::debug!("Fetched {} in {} attempt(s)", task.url(), outcome.attempts);
        self.process(outcome.result)
    }

    /// Extraction, follow-on queueing and sink dispatch
    ///
    /// Synchronous: the parsed document inside `result` must never be held
    /// across an await point.
    fn process(&self, mut result: FetchResult) -> Option<Offered> {
        let extracted = catch_unwind(AssertUnwindSafe(|| self.extractor.process(&mut result)));
        if let Err(panic) = extracted {
            self.stats.record_extractor_panic();
            tracing::error!(
                "Extractor panicked on {}, dropping its output: {}",
                result.task().url(),
                panic_message(&*panic)
            );
            return None;
        }

        let (record, follow_ons) = result.into_outputs();
        let offered = self.handle.offer(follow_ons);
        self.stats.record_follow_ons(offered.queued + offered.overflow.len());

        if record.skip() {
            self.stats.record_skipped();
            tracing::debug!("Record for {} skipped", record.task().url());
            return Some(offered);
        }

        self.stats.record_emitted();
        for (index, sink) in self.sinks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| sink.process(&record, &self.handle))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.stats.record_sink_error();
                    tracing::error!("Sink #{} failed on {}: {}", index, record.task().url(), e);
                }
                Err(_) => {
                    self.stats.record_sink_error();
                    tracing::error!("Sink #{} panicked on {}", index, record.task().url());
                }
            }
        }

        Some(offered)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message;
    }
    payload
        .downcast_ref::<String>()
        .map_or("non-string panic payload", String::as_str)
}
