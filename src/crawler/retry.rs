//! Bounded retry with an inter-request delay
//!
//! [`RetryPolicy::run`] wraps a [`Fetcher`] call:
//! - the [`DelayPolicy`] is applied before every attempt, the first included
//! - the loop stops at the first successful attempt
//! - failures caused by the task itself (empty URL, unknown kind) stop at once
//! - there is no exponential backoff

use crate::config::{DelayConfig, DelayMode};
use crate::crawler::fetcher::Fetcher;
use crate::task::{FetchResult, FetchTask};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Default attempt budget per task
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause taken before each download attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    /// Always wait the same amount
    Fixed(Duration),

    /// Wait a uniformly random time in `[min, max]`, drawn per attempt
    Random { min: Duration, max: Duration },
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::ZERO)
    }
}

impl From<&DelayConfig> for DelayPolicy {
    fn from(config: &DelayConfig) -> Self {
        let start = Duration::from_millis(config.start_ms);
        match config.mode {
            DelayMode::Fixed => Self::Fixed(start),
            DelayMode::Random => Self::Random {
                min: start,
                max: Duration::from_millis(config.end_ms.max(config.start_ms)),
            },
        }
    }
}

impl DelayPolicy {
    /// Picks the delay for the next attempt
    pub fn next_delay(&self) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Random { min, max } if max <= min => min,
            Self::Random { min, max } => {
                let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
                Duration::from_millis(millis as u64)
            }
        }
    }

    /// Sleeps for the next delay
    pub async fn wait(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Result of running a task through the retry loop
#[derive(Debug)]
pub struct RetryOutcome {
    /// Result of the last attempt made
    pub result: FetchResult,

    /// Number of download attempts made
    pub attempts: u32,
}

/// Attempt budget plus delay policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: DelayPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DelayPolicy::default())
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` downloads (minimum 1)
    pub fn new(max_attempts: u32, delay: DelayPolicy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> &DelayPolicy {
        &self.delay
    }

    /// Fetches `task`, retrying failed attempts within the budget
    pub async fn run(&self, fetcher: &dyn Fetcher, task: Arc<FetchTask>) -> RetryOutcome {
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.delay.wait().await;

            let result = fetcher.fetch(Arc::clone(&task)).await;
            let retryable = result.error().map_or(false, |e| e.is_retryable());

            if result.is_success() || !retryable || attempts >= self.max_attempts {
                return RetryOutcome { result, attempts };
            }

            tracing::debug!(
                "Attempt {}/{} for {} failed: {}",
                attempts,
                self.max_attempts,
                task.url(),
                result.error_message()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    /// Fails the first `failures` calls, then succeeds
    struct FlakyFetcher {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyFetcher {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for FlakyFetcher {
        async fn fetch(&self, task: Arc<FetchTask>) -> FetchResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                FetchResult::failed(task, FetchError::Transport("connection refused".into()))
            } else {
                FetchResult::new(task)
            }
        }
    }

    fn task() -> Arc<FetchTask> {
        Arc::new(FetchTask::new("https://example.com/", "text"))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let fetcher = FlakyFetcher::new(0);
        let outcome = RetryPolicy::default().run(&fetcher, task()).await;

        assert!(outcome.result.is_success());
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let fetcher = FlakyFetcher::new(1);
        let outcome = RetryPolicy::default().run(&fetcher, task()).await;

        assert!(outcome.result.is_success());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let fetcher = FlakyFetcher::new(u32::MAX);
        let outcome = RetryPolicy::default().run(&fetcher, task()).await;

        assert!(!outcome.result.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert!(outcome.result.error_message().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_invalid_task_is_not_retried() {
        struct EmptyUrlFetcher(AtomicU32);

        #[async_trait]
        impl Fetcher for EmptyUrlFetcher {
            async fn fetch(&self, task: Arc<FetchTask>) -> FetchResult {
                self.0.fetch_add(1, Ordering::SeqCst);
                FetchResult::failed(task, FetchError::EmptyUrl)
            }
        }

        let fetcher = EmptyUrlFetcher(AtomicU32::new(0));
        let outcome = RetryPolicy::default().run(&fetcher, task()).await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(fetcher.0.load(Ordering::SeqCst), 1);
        assert!(!outcome.result.error_message().is_empty());
    }

    #[tokio::test]
    async fn test_delay_applies_before_every_attempt() {
        let fetcher = FlakyFetcher::new(u32::MAX);
        let policy = RetryPolicy::new(3, DelayPolicy::Fixed(Duration::from_millis(30)));

        let start = Instant::now();
        let outcome = policy.run(&fetcher, task()).await;

        assert_eq!(outcome.attempts, 3);
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_random_delay_within_bounds() {
        let policy = DelayPolicy::Random {
            min: Duration::from_millis(10),
            max: Duration::from_millis(20),
        };

        for _ in 0..100 {
            let delay = policy.next_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_random_delay_with_equal_bounds() {
        let policy = DelayPolicy::Random {
            min: Duration::from_millis(15),
            max: Duration::from_millis(15),
        };
        assert_eq!(policy.next_delay(), Duration::from_millis(15));
    }

    #[test]
    fn test_delay_policy_from_config() {
        let fixed = DelayConfig {
            mode: DelayMode::Fixed,
            start_ms: 250,
            end_ms: 900,
        };
        assert_eq!(
            DelayPolicy::from(&fixed),
            DelayPolicy::Fixed(Duration::from_millis(250))
        );

        let random = DelayConfig {
            mode: DelayMode::Random,
            start_ms: 100,
            end_ms: 300,
        };
        assert_eq!(
            DelayPolicy::from(&random),
            DelayPolicy::Random {
                min: Duration::from_millis(100),
                max: Duration::from_millis(300),
            }
        );
    }

    #[test]
    fn test_zero_attempts_becomes_one() {
        assert_eq!(RetryPolicy::new(0, DelayPolicy::default()).max_attempts(), 1);
    }
}
