//! In-memory sink used for synchronous collection

use crate::crawler::EngineHandle;
use crate::output::traits::{OutputResult, Sink};
use crate::task::ExtractedRecord;
use std::sync::{Mutex, PoisonError};

/// Accumulates every record it receives
#[derive(Debug, Default)]
pub struct CollectSink {
    records: Mutex<Vec<ExtractedRecord>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records collected so far
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the collected records, leaving the sink empty
    pub fn collected(&self) -> Vec<ExtractedRecord> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *records)
    }
}

impl Sink for CollectSink {
    fn process(&self, record: &ExtractedRecord, _engine: &EngineHandle) -> OutputResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
