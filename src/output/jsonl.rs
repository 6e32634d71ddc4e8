//! Sink that appends records to a JSON Lines file
//!
//! Each record is written as one line:
//! `{"url": "...", "tag": "...", "fields": {...}}`

use crate::crawler::EngineHandle;
use crate::output::traits::{OutputError, OutputResult, Sink};
use crate::task::ExtractedRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Writes one JSON object per record
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if missing
    ///
    /// # Returns
    ///
    /// * `Ok(JsonLinesSink)` - File is open and ready
    /// * `Err(OutputError)` - The file could not be opened
    pub fn create(path: &Path) -> OutputResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes buffered lines to disk
    pub fn flush(&self) -> OutputResult<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
            .map_err(|e| OutputError::Write(format!("{}: {}", self.path.display(), e)))
    }
}

impl Sink for JsonLinesSink {
    fn process(&self, record: &ExtractedRecord, _engine: &EngineHandle) -> OutputResult<()> {
        let line = serde_json::to_string(&record.to_row())?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        Ok(())
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to flush {}", e);
        }
    }
}
