//! Output module: record sinks and run statistics
//!
//! This module handles:
//! - The [`Sink`] trait every record consumer implements
//! - Built-in sinks for stdout, JSON Lines files and in-memory collection
//! - Counters and the end-of-run summary

mod collect;
mod console;
mod jsonl;
pub mod stats;
mod traits;

pub use collect::CollectSink;
pub use console::{format_record, ConsoleSink};
pub use jsonl::JsonLinesSink;
pub use stats::{print_run_stats, EngineStats, RunStats};
pub use traits::{OutputError, OutputResult, Sink};
