use serde::Deserialize;

/// Main configuration structure for an Arachne engine
///
/// Every section and key has a default, so an empty file is a valid
/// configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub delay: DelayConfig,
    pub http: HttpConfig,
    pub extract: ExtractConfig,
}

/// Which queueing policy holds pending tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePolicy {
    /// FIFO that drops tasks whose URL is already queued
    Dedup,

    /// FIFO without deduplication, unbounded unless `queue-capacity` is set
    #[default]
    Plain,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Name used in logs and exposed to sinks
    pub name: String,

    /// Maximum number of task units in flight
    pub worker_count: usize,

    /// Stop once the queue is empty and no work is in flight
    pub exit_on_completion: bool,

    /// Queueing policy
    pub queue: QueuePolicy,

    /// Capacity of the plain queue; unbounded when unset
    ///
    /// Units that hit a full queue wait for room without holding a worker.
    pub queue_capacity: Option<usize>,

    /// Sleep between polls of an empty queue (milliseconds)
    pub idle_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "arachne".to_string(),
            worker_count: 1,
            exit_on_completion: true,
            queue: QueuePolicy::default(),
            queue_capacity: None,
            idle_interval_ms: 500,
        }
    }
}

/// How the inter-request delay is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayMode {
    /// Always wait `start-ms`
    #[default]
    Fixed,

    /// Wait a random time between `start-ms` and `end-ms`
    Random,
}

/// Delay applied before every download attempt
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DelayConfig {
    pub mode: DelayMode,

    /// Fixed delay, or lower bound of the random delay (milliseconds)
    pub start_ms: u64,

    /// Upper bound of the random delay (milliseconds)
    pub end_ms: u64,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    pub user_agent: String,

    /// Total request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Proxy used for tasks that don't set their own
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("arachne/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            proxy: None,
        }
    }
}

/// Settings for the built-in link extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractConfig {
    /// Links are followed until this depth from the seed tasks
    pub max_depth: u32,

    /// Only follow links on the seed page's host
    pub same_host_only: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            same_host_only: true,
        }
    }
}
