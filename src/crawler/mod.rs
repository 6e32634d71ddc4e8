//! Crawler module: the engine and its moving parts
//!
//! This module contains the core crawling logic, including:
//! - Task queues with and without URL deduplication
//! - The worker-pool limiter bounding in-flight task units
//! - HTTP fetching with retry and delay policies
//! - HTML outlining and the built-in link extractor
//! - Overall run coordination in [`Engine`]

mod coordinator;
mod extractor;
mod fetcher;
mod limiter;
mod parser;
mod retry;
mod scheduler;

pub use coordinator::{Engine, EngineHandle, EngineState};
pub use extractor::{task_depth, Extractor, LinkExtractor, DEPTH_KEY};
pub use fetcher::{build_http_client, Fetcher, HttpFetcher};
pub use limiter::{ConcurrencyLimiter, WorkerPermit};
pub use parser::{jsonp_to_json, outline_document, outline_html, resolve_link, PageOutline};
pub use retry::{DelayPolicy, RetryOutcome, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use scheduler::{build_queue, dedup_key, DedupKey, DedupQueue, FifoQueue, TaskQueue};
