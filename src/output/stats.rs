//! Run statistics
//!
//! The engine updates [`EngineStats`] counters from every task unit and
//! snapshots them into a [`RunStats`] when the run ends.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by all task units of a run
#[derive(Debug, Default)]
pub struct EngineStats {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    attempts: AtomicU64,
    records_emitted: AtomicU64,
    records_skipped: AtomicU64,
    follow_ons: AtomicU64,
    sink_errors: AtomicU64,
    extractor_panics: AtomicU64,
    unit_panics: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the end of the retry loop for one task
    pub fn record_fetch(&self, attempts: u32, success: bool) {
        self.attempts.fetch_add(u64::from(attempts), Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_follow_ons(&self, count: usize) {
        self.follow_ons.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extractor_panic(&self) {
        self.extractor_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task unit that panicked before its fetch finished
    ///
    /// The task counts as failed.
    pub fn record_unit_panic(&self) {
        self.unit_panics.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the counters into a run summary
    pub fn snapshot(&self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> RunStats {
        RunStats {
            started_at,
            finished_at,
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            follow_ons: self.follow_ons.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            extractor_panics: self.extractor_panics.load(Ordering::Relaxed),
            unit_panics: self.unit_panics.load(Ordering::Relaxed),
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Tasks handed to a task unit
    pub dispatched: u64,

    /// Tasks whose final attempt succeeded
    pub succeeded: u64,

    /// Tasks abandoned after their last attempt
    pub failed: u64,

    /// Download attempts across all tasks
    pub attempts: u64,

    /// Records handed to sinks
    pub records_emitted: u64,

    /// Records marked skipped by the extractor
    pub records_skipped: u64,

    /// Follow-on tasks pushed to the queue
    pub follow_ons: u64,

    pub sink_errors: u64,
    pub extractor_panics: u64,

    /// Task units that panicked during fetch or retry
    pub unit_panics: u64,
}

impl RunStats {
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.succeeded + self.failed;
        if finished == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / finished as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `name` - Engine name shown in the header
/// * `stats` - The statistics to display
pub fn print_run_stats(name: &str, stats: &RunStats) {
    println!("=== {} Run Statistics ===\n", name);

    println!("Timing:");
    println!("  Started:  {}", stats.started_at.to_rfc3339());
    println!("  Finished: {}", stats.finished_at.to_rfc3339());
    println!("  Duration: {:.1}s", stats.duration_seconds());
    println!();

    println!("Tasks:");
    println!("  Dispatched: {}", stats.dispatched);
    println!("  Succeeded: {}", stats.succeeded);
    println!("  Failed: {}", stats.failed);
    println!("  Download attempts: {}", stats.attempts);
    println!("  Follow-on tasks queued: {}", stats.follow_ons);
    println!();

    println!("Records:");
    println!("  Emitted: {}", stats.records_emitted);
    println!("  Skipped: {}", stats.records_skipped);

    if stats.sink_errors > 0 || stats.extractor_panics > 0 || stats.unit_panics > 0 {
        println!();
        println!("Errors:");
        println!("  Sink errors: {}", stats.sink_errors);
        println!("  Extractor panics: {}", stats.extractor_panics);
        println!("  Task unit panics: {}", stats.unit_panics);
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} tasks)",
        stats.success_rate(),
        stats.succeeded,
        stats.succeeded + stats.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_snapshot_counts() {
        let stats = EngineStats::new();
        stats.record_dispatch();
        stats.record_dispatch();
        stats.record_fetch(1, true);
        stats.record_fetch(3, false);
        stats.record_emitted();
        stats.record_follow_ons(4);

        let now = Utc::now();
        let run = stats.snapshot(now, now);

        assert_eq!(run.dispatched, 2);
        assert_eq!(run.succeeded, 1);
        assert_eq!(run.failed, 1);
        assert_eq!(run.attempts, 4);
        assert_eq!(run.records_emitted, 1);
        assert_eq!(run.follow_ons, 4);
    }

    #[test]
    fn test_unit_panic_counts_as_failed() {
        let stats = EngineStats::new();
        stats.record_dispatch();
        stats.record_unit_panic();

        let now = Utc::now();
        let run = stats.snapshot(now, now);
        assert_eq!(run.unit_panics, 1);
        assert_eq!(run.failed, 1);
        assert_eq!(run.attempts, 0);
    }

    #[test]
    fn test_success_rate() {
        let stats = EngineStats::new();
        for _ in 0..4 {
            stats.record_fetch(1, true);
        }
        stats.record_fetch(3, false);

        let now = Utc::now();
        let rate = stats.snapshot(now, now).success_rate();
        assert!((rate - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_zero_tasks() {
        let now = Utc::now();
        assert_eq!(EngineStats::new().snapshot(now, now).success_rate(), 0.0);
    }

    #[test]
    fn test_duration() {
        let started = Utc::now();
        let finished = started + Duration::milliseconds(1500);
        let run = EngineStats::new().snapshot(started, finished);
        assert!((run.duration_seconds() - 1.5).abs() < 0.001);
    }
}
