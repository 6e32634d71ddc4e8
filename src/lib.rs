//! Arachne: a bounded-concurrency web crawling engine
//!
//! This crate pulls fetch tasks from a queue, downloads and decodes their
//! content, hands each result to pluggable extraction logic, and fans the
//! extracted records out to pluggable sinks. In-flight work is bounded by a
//! worker pool and a failing task never stops the run.
//!
//! # Example
//!
//! ```no_run
//! use arachne::config::Config;
//! use arachne::crawler::Engine;
//! use arachne::output::ConsoleSink;
//! use arachne::task::{FetchResult, FetchTask};
//!
//! # async fn demo() -> arachne::Result<()> {
//! let extractor = |result: &mut FetchResult| {
//!     let length = result.body().len();
//!     result.add_field("length", length.to_string());
//! };
//!
//! let engine = Engine::new(&Config::default(), extractor)?.with_sink(ConsoleSink::new());
//! engine.add_task(FetchTask::new("https://example.com/", "html"));
//! let stats = engine.run().await;
//! println!("{} records", stats.records_emitted);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crawler;
pub mod output;
pub mod task;

use thiserror::Error;

/// Main error type for Arachne operations
///
/// Per-task download failures are not represented here; they travel on the
/// [`task::FetchResult`] as a [`task::FetchError`].
#[derive(Debug, Error)]
pub enum ArachneError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Worker pool closed")]
    LimiterClosed,

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Arachne operations
pub type Result<T> = std::result::Result<T, ArachneError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Engine, EngineHandle, EngineState, Extractor};
pub use output::{OutputResult, RunStats, Sink};
pub use task::{ContentKind, ExtractedRecord, FetchError, FetchResult, FetchTask};
