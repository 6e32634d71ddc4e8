//! Sink trait and output errors
//!
//! A sink receives every extracted record that was not marked skipped.
//! Sinks are shared between concurrently running task units, so they take
//! `&self` and synchronize internally.

use crate::crawler::EngineHandle;
use crate::task::ExtractedRecord;
use thiserror::Error;

/// Errors that can occur while emitting records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for record consumers
///
/// Sinks run in registration order for each record. An error returned by one
/// sink is logged by the engine and does not stop the remaining sinks.
pub trait Sink: Send + Sync {
    /// Consumes one record
    ///
    /// # Arguments
    ///
    /// * `record` - The extracted fields and the task they came from
    /// * `engine` - Handle to the running engine, usable to queue more tasks
    fn process(&self, record: &ExtractedRecord, engine: &EngineHandle) -> OutputResult<()>;
}

impl<F> Sink for F
where
    F: Fn(&ExtractedRecord, &EngineHandle) -> OutputResult<()> + Send + Sync,
{
    fn process(&self, record: &ExtractedRecord, engine: &EngineHandle) -> OutputResult<()> {
        self(record, engine)
    }
}
