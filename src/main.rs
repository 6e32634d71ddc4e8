//! Arachne main entry point
//!
//! This is the command-line interface for the Arachne crawling engine. It
//! crawls the given seed URLs with the built-in link extractor and prints
//! every record.

use anyhow::{bail, Context};
use arachne::config::{load_config_with_hash, Config};
use arachne::crawler::{Engine, LinkExtractor};
use arachne::output::{print_run_stats, ConsoleSink, JsonLinesSink};
use arachne::task::{ContentKind, FetchTask};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Arachne: a bounded-concurrency web crawling engine
///
/// Arachne fetches the seed URLs, records the title and link count of every
/// page, and follows links on the same host up to the configured depth.
#[derive(Parser, Debug)]
#[command(name = "arachne")]
#[command(version)]
#[command(about = "A bounded-concurrency web crawling engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Seed URL to crawl (repeatable)
    #[arg(short, long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Content kind of the seed URLs (html, json, jsonp, text)
    #[arg(short, long, default_value = "html")]
    kind: String,

    /// Override the configured worker count
    #[arg(short, long)]
    workers: Option<usize>,

    /// Also append records to this JSON Lines file
    #[arg(long, value_name = "PATH")]
    jsonl: Option<PathBuf>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(workers) = cli.workers {
        config.engine.worker_count = workers;
    }

    let kind = ContentKind::from(cli.kind.as_str());
    if !kind.is_supported() {
        bail!("unsupported content kind '{}'", kind);
    }

    if cli.urls.is_empty() {
        bail!("no seed URLs given, pass at least one --url");
    }

    if cli.dry_run {
        handle_dry_run(&config, &cli.urls, &kind);
        return Ok(());
    }

    handle_crawl(config, &cli, kind).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("arachne=info,warn"),
            1 => EnvFilter::new("arachne=debug,info"),
            2 => EnvFilter::new("arachne=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings and seeds
fn handle_dry_run(config: &Config, urls: &[String], kind: &ContentKind) {
    println!("=== Arachne Dry Run ===\n");

    println!("Engine:");
    println!("  Name: {}", config.engine.name);
    println!("  Workers: {}", config.engine.worker_count.max(1));
    println!("  Queue: {:?}", config.engine.queue);
    match config.engine.queue_capacity {
        Some(capacity) => println!("  Queue capacity: {}", capacity),
        None => println!("  Queue capacity: unbounded"),
    }
    println!("  Exit on completion: {}", config.engine.exit_on_completion);

    println!("\nDelay:");
    println!(
        "  {:?} {}..{}ms",
        config.delay.mode, config.delay.start_ms, config.delay.end_ms
    );

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout_secs);
    if let Some(proxy) = &config.http.proxy {
        println!("  Proxy: {}", proxy);
    }

    println!("\nExtraction:");
    println!("  Max depth: {}", config.extract.max_depth);
    println!("  Same host only: {}", config.extract.same_host_only);

    println!("\nSeeds ({}, kind {}):", urls.len(), kind);
    for url in urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, cli: &Cli, kind: ContentKind) -> anyhow::Result<()> {
    let mut engine =
        Engine::new(&config, LinkExtractor::new(&config.extract))?.with_sink(ConsoleSink::new());

    if let Some(path) = &cli.jsonl {
        let sink = JsonLinesSink::create(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        engine.add_sink(Arc::new(sink));
    }

    tracing::info!("Total seed URLs: {}", cli.urls.len());
    let seeds = cli
        .urls
        .iter()
        .map(|url| FetchTask::new(url.as_str(), kind.clone()));

    let stats = engine.run_with(seeds).await;

    if !cli.quiet {
        print_run_stats(engine.name(), &stats);
    }

    Ok(())
}
