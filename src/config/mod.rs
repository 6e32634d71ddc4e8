//! Configuration module for Arachne
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use arachne::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("arachne.toml")).unwrap();
//! println!("Engine will run {} workers", config.engine.worker_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DelayConfig, DelayMode, EngineConfig, ExtractConfig, HttpConfig, QueuePolicy,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
