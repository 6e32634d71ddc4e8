//! Fetch results
//!
//! A [`FetchResult`] is created fresh for every download attempt. The fetcher
//! fills in the response side; the extractor then adds fields to the bound
//! [`ExtractedRecord`] and queues follow-on tasks.

use super::{ContentKind, Cookie, ExtractedRecord, FetchTask};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use scraper::Html;
use std::sync::Arc;
use thiserror::Error;

/// Why a fetch attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("url is empty")]
    EmptyUrl,

    #[error("invalid url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("unsupported content kind: {0}")]
    UnsupportedKind(String),

    #[error("invalid proxy address '{proxy}': {message}")]
    InvalidProxy { proxy: String, message: String },

    #[error("invalid request method: {0}")]
    InvalidMethod(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to decode {kind} body: {message}")]
    Decode { kind: String, message: String },
}

impl FetchError {
    /// Returns true if another attempt could succeed
    ///
    /// Problems with the task itself are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Body(_) | Self::Decode { .. }
        )
    }
}

/// The outcome of one attempt at a [`FetchTask`]
pub struct FetchResult {
    task: Arc<FetchTask>,
    error: Option<FetchError>,
    status: Option<StatusCode>,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    body: String,
    document: Option<Html>,
    json: Option<serde_json::Value>,
    record: ExtractedRecord,
    follow_ons: Vec<FetchTask>,
}

impl FetchResult {
    /// Creates an empty, successful result for `task`
    pub fn new(task: Arc<FetchTask>) -> Self {
        Self {
            record: ExtractedRecord::new(Arc::clone(&task)),
            task,
            error: None,
            status: None,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: String::new(),
            document: None,
            json: None,
            follow_ons: Vec::new(),
        }
    }

    /// Creates a failed result for `task`
    pub fn failed(task: Arc<FetchTask>, error: FetchError) -> Self {
        let mut result = Self::new(task);
        result.error = Some(error);
        result
    }

    pub fn task(&self) -> &FetchTask {
        &self.task
    }

    /// Shared handle to the originating task
    pub fn task_handle(&self) -> Arc<FetchTask> {
        Arc::clone(&self.task)
    }

    pub fn url_tag(&self) -> &str {
        self.task.tag()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    /// Error text, empty on success
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    pub fn set_error(&mut self, error: FetchError) {
        self.error = Some(error);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn set_cookies(&mut self, cookies: Vec<Cookie>) {
        self.cookies = cookies;
    }

    /// Response body, decoded to UTF-8
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: String) {
        self.body = body;
    }

    /// Parsed HTML document, present for `html` tasks
    pub fn document(&self) -> Option<&Html> {
        self.document.as_ref()
    }

    pub fn set_document(&mut self, document: Html) {
        self.document = Some(document);
    }

    /// Re-parses the stored body into a fresh document
    pub fn reset_document(&mut self) -> &Html {
        self.document.insert(Html::parse_document(&self.body))
    }

    /// Parsed JSON value, present for `json` and `jsonp` tasks
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }

    pub fn set_json(&mut self, value: serde_json::Value) {
        self.json = Some(value);
    }

    pub fn record(&self) -> &ExtractedRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut ExtractedRecord {
        &mut self.record
    }

    /// Adds a field to the bound record
    pub fn add_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.record.insert(key, value);
    }

    /// Marks the bound record so that no sink receives it
    pub fn set_skip(&mut self, skip: bool) {
        self.record.set_skip(skip);
    }

    pub fn skip(&self) -> bool {
        self.record.skip()
    }

    /// Queues a follow-on task
    pub fn add_follow_on(&mut self, task: FetchTask) {
        self.follow_ons.push(task);
    }

    /// Queues a plain GET follow-on for `url`
    pub fn add_follow_on_url(&mut self, url: impl Into<String>, kind: impl Into<ContentKind>) {
        self.add_follow_on(FetchTask::new(url, kind));
    }

    pub fn add_follow_on_urls<I, S>(&mut self, urls: I, kind: ContentKind)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for url in urls {
            self.add_follow_on(FetchTask::new(url, kind.clone()));
        }
    }

    /// Queues a plain GET follow-on routed through `proxy`
    pub fn add_follow_on_url_with_proxy(
        &mut self,
        url: impl Into<String>,
        kind: impl Into<ContentKind>,
        proxy: impl Into<String>,
    ) {
        self.add_follow_on(FetchTask::new(url, kind).with_proxy(proxy));
    }

    pub fn follow_ons(&self) -> &[FetchTask] {
        &self.follow_ons
    }

    /// Splits the result into its record and follow-on tasks, dropping the
    /// response data
    pub fn into_outputs(self) -> (ExtractedRecord, Vec<FetchTask>) {
        (self.record, self.follow_ons)
    }
}

impl std::fmt::Debug for FetchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResult")
            .field("url", &self.task.url())
            .field("error", &self.error)
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .field("document", &self.document.is_some())
            .field("json", &self.json.is_some())
            .field("fields", &self.record.fields().len())
            .field("follow_ons", &self.follow_ons.len())
            .finish()
    }
}
