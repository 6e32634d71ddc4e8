//! Sink that prints records to stdout

use crate::crawler::EngineHandle;
use crate::output::traits::{OutputResult, Sink};
use crate::task::ExtractedRecord;
use std::fmt::Write as _;
use std::io::Write;

/// Prints each record as a block of `key: value` lines
#[derive(Debug, Default, Clone)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

/// Renders a record the way the console sink prints it
pub fn format_record(record: &ExtractedRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "----------------------------------------");
    let _ = writeln!(out, "Crawled url: {}", record.task().url());
    for (key, value) in record.fields() {
        let _ = writeln!(out, "{}: {}", key, value);
    }
    out
}

impl Sink for ConsoleSink {
    fn process(&self, record: &ExtractedRecord, _engine: &EngineHandle) -> OutputResult<()> {
        let rendered = format_record(record);
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(rendered.as_bytes())?;
        lock.flush()?;
        Ok(())
    }
}
