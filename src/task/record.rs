//! Extracted records: the fields an extractor pulled out of one page

use super::FetchTask;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Flat string map of extracted fields, bound to the task that produced it
///
/// Records with the skip flag set are never handed to a sink.
#[derive(Debug, Clone)]
pub struct ExtractedRecord {
    task: Arc<FetchTask>,
    fields: BTreeMap<String, String>,
    skip: bool,
}

impl ExtractedRecord {
    pub fn new(task: Arc<FetchTask>) -> Self {
        Self {
            task,
            fields: BTreeMap::new(),
            skip: false,
        }
    }

    /// Sets a field, replacing any previous value under the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn task(&self) -> &FetchTask {
        &self.task
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn set_skip(&mut self, skip: bool) {
        self.skip = skip;
    }

    /// Serializable view of this record: url, tag and fields
    pub fn to_row(&self) -> RecordRow<'_> {
        RecordRow {
            url: self.task.url(),
            tag: self.task.tag(),
            fields: &self.fields,
        }
    }
}

/// Borrowed, serializable form of an [`ExtractedRecord`]
#[derive(Debug, Serialize)]
pub struct RecordRow<'a> {
    pub url: &'a str,
    pub tag: &'a str,
    pub fields: &'a BTreeMap<String, String>,
}
