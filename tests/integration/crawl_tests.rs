//! Integration tests for the engine
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full fetch, extract and emit cycle end-to-end.

use arachne::config::{Config, ExtractConfig, QueuePolicy};
use arachne::crawler::{Engine, Fetcher, LinkExtractor};
use arachne::output::{CollectSink, JsonLinesSink, Sink};
use arachne::task::{FetchResult, FetchTask};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with a short idle interval and no delay
fn create_test_config(worker_count: usize, queue: QueuePolicy) -> Config {
    let mut config = Config::default();
    config.engine.name = "integration".to_string();
    config.engine.worker_count = worker_count;
    config.engine.queue = queue;
    config.engine.idle_interval_ms = 10;
    config.http.timeout_secs = 5;
    config
}

/// Copies the `a` key of a JSON body into the record
///
/// Strings are stored without their JSON quotes.
fn copy_a(result: &mut FetchResult) {
    let value = result
        .json()
        .and_then(|json| json.get("a"))
        .map(|a| a.as_str().map_or_else(|| a.to_string(), str::to_string));
    if let Some(value) = value {
        result.add_field("a", value);
    }
}

/// Overlap counters shared between a test and its fetcher
#[derive(Default)]
struct Overlap {
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Sleeps for a fixed time and tracks how many fetches overlap
struct SlowFetcher {
    delay: Duration,
    overlap: Arc<Overlap>,
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, task: Arc<FetchTask>) -> FetchResult {
        let now = self.overlap.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.overlap.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.overlap.active.fetch_sub(1, Ordering::SeqCst);

        let mut result = FetchResult::new(task);
        result.set_body("slow".to_string());
        result
    }
}

#[tokio::test]
async fn test_json_task_produces_one_record() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"a": 1})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let collector = Arc::new(CollectSink::new());
    let mut engine = Engine::new(&create_test_config(1, QueuePolicy::Plain), copy_a).unwrap();
    engine.add_sink(Arc::clone(&collector) as Arc<dyn Sink>);
    engine.add_url(format!("{}/data", mock_server.uri()), "json");

    let stats = engine.run().await;
    let records = collector.collected();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("a"), Some("1"));
    assert_eq!(stats.follow_ons, 0);
    assert_eq!(stats.succeeded, 1);
}

#[tokio::test]
async fn test_duplicate_urls_fetched_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/same"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/same", mock_server.uri());
    let engine = Engine::new(&create_test_config(2, QueuePolicy::Dedup), |_: &mut FetchResult| {})
        .unwrap();
    engine.add_url(url.as_str(), "text");
    engine.add_url(url.as_str(), "text");

    let stats = engine.run().await;
    assert_eq!(stats.dispatched, 1);
}

#[tokio::test]
async fn test_worker_count_bounds_concurrency() {
    let delay = Duration::from_millis(200);
    let overlap = Arc::new(Overlap::default());
    let engine = Engine::new(&create_test_config(2, QueuePolicy::Plain), |_: &mut FetchResult| {})
        .unwrap()
        .with_fetcher(SlowFetcher {
            delay,
            overlap: Arc::clone(&overlap),
        });

    for i in 0..5 {
        engine.add_url(format!("https://example.com/{}", i), "text");
    }

    let started = Instant::now();
    let stats = engine.run().await;
    let elapsed = started.elapsed();

    assert_eq!(stats.succeeded, 5);
    assert_eq!(overlap.peak.load(Ordering::SeqCst), 2);
    // Three waves of two, two, one
    assert!(elapsed >= delay * 3, "finished too early: {:?}", elapsed);
    assert!(elapsed < delay * 5, "finished too late: {:?}", elapsed);
}

#[tokio::test]
async fn test_empty_queue_terminates_immediately() {
    let engine = Engine::new(&create_test_config(1, QueuePolicy::Plain), copy_a).unwrap();

    let started = Instant::now();
    let stats = engine.run().await;

    assert_eq!(stats.dispatched, 0);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_unreachable_task_is_abandoned_after_three_attempts() {
    let collector = Arc::new(CollectSink::new());
    let mut engine = Engine::new(&create_test_config(1, QueuePolicy::Plain), copy_a).unwrap();
    engine.add_sink(Arc::clone(&collector) as Arc<dyn Sink>);
    engine.add_url("http://127.0.0.1:1/", "text");

    let stats = engine.run().await;

    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.failed, 1);
    assert!(collector.is_empty());
}

#[tokio::test]
async fn test_server_errors_are_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let record = Engine::new(&create_test_config(1, QueuePolicy::Plain), |result: &mut FetchResult| {
        let status = result.status().map(|s| s.as_u16().to_string()).unwrap_or_default();
        result.add_field("status", status);
    })
    .unwrap()
    .collect_one(FetchTask::new(format!("{}/broken", mock_server.uri()), "text"))
    .await
    .unwrap();

    assert_eq!(record.get("status"), Some("500"));
}

#[tokio::test]
async fn test_link_extractor_crawls_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let home = r#"<html><head><title>Home</title></head><body>
        <a href="/a">A</a>
        <a href="/b">B</a>
        <a href="https://elsewhere.invalid/">Away</a>
    </body></html>"#;
    let leaf = r#"<html><head><title>Leaf</title></head><body>
        <a href="/">Back home</a>
    </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(home, "text/html"))
        .expect(1)
        .mount(&mock_server)
        .await;
    for leaf_path in ["/a", "/b"] {
        Mock::given(method("GET"))
            .and(path(leaf_path))
            .respond_with(ResponseTemplate::new(200).set_body_raw(leaf, "text/html"))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let extractor = LinkExtractor::new(&ExtractConfig {
        max_depth: 1,
        same_host_only: true,
    });
    let records = Engine::new(&create_test_config(2, QueuePolicy::Dedup), extractor)
        .unwrap()
        .collect(vec![FetchTask::new(format!("{}/", base_url), "html")])
        .await;

    assert_eq!(records.len(), 3);

    let home_record = records
        .iter()
        .find(|r| r.get("title") == Some("Home"))
        .unwrap();
    assert_eq!(home_record.get("link-count"), Some("3"));
    assert_eq!(
        records.iter().filter(|r| r.get("title") == Some("Leaf")).count(),
        2
    );
}

#[tokio::test]
async fn test_records_written_to_jsonl() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"a": "x"})))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("records.jsonl");

    {
        let sink = JsonLinesSink::create(&output).unwrap();
        let engine = Engine::new(&create_test_config(1, QueuePolicy::Plain), copy_a)
            .unwrap()
            .with_sink(sink);
        engine.add_task(FetchTask::new(format!("{}/data", mock_server.uri()), "json").with_tag("api"));
        engine.run().await;
    }

    let content = std::fs::read_to_string(&output).unwrap();
    let row: serde_json::Value = serde_json::from_str(content.trim()).unwrap();

    assert_eq!(row["tag"], "api");
    assert_eq!(row["fields"]["a"], "x");
}

#[tokio::test]
async fn test_bounded_queue_crawl_finishes() {
    let mock_server = MockServer::start().await;
    let home = r#"<html><body>
        <a href="/a">A</a>
        <a href="/b">B</a>
        <a href="/c">C</a>
    </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(home, "text/html"))
        .expect(1)
        .mount(&mock_server)
        .await;
    for leaf_path in ["/a", "/b", "/c"] {
        Mock::given(method("GET"))
            .and(path(leaf_path))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let mut config = create_test_config(1, QueuePolicy::Plain);
    config.engine.queue_capacity = Some(1);
    let extractor = LinkExtractor::new(&config.extract);
    let crawl = Engine::new(&config, extractor)
        .unwrap()
        .collect(vec![FetchTask::new(format!("{}/", mock_server.uri()), "html")]);

    let records = tokio::time::timeout(Duration::from_secs(10), crawl)
        .await
        .expect("crawl did not finish");

    assert_eq!(records.len(), 4);
}
