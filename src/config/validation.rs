use crate::config::types::{Config, DelayConfig, DelayMode, EngineConfig, HttpConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on worker count; far beyond what a single crawl needs
const MAX_WORKERS: usize = 1024;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_delay_config(&config.delay)?;
    validate_http_config(&config.http)?;
    Ok(())
}

/// Validates engine configuration
///
/// A worker count of 0 is accepted and treated as 1.
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.worker_count > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "worker-count must be at most {}, got {}",
            MAX_WORKERS, config.worker_count
        )));
    }

    if config.queue_capacity == Some(0) {
        return Err(ConfigError::Validation(
            "queue-capacity must be >= 1".to_string(),
        ));
    }

    if config.idle_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "idle-interval-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates delay configuration
fn validate_delay_config(config: &DelayConfig) -> Result<(), ConfigError> {
    if config.mode == DelayMode::Random && config.end_ms < config.start_ms {
        return Err(ConfigError::Validation(format!(
            "random delay needs end-ms >= start-ms, got {}..{}",
            config.start_ms, config.end_ms
        )));
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got timeout-secs={} connect-timeout-secs={}",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    Ok(())
}
