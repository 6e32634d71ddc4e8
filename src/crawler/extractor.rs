//! Extraction: turning a fetched page into record fields and new tasks

use crate::config::ExtractConfig;
use crate::crawler::parser::outline_document;
use crate::task::{ContentKind, FetchResult, FetchTask};
use serde_json::json;
use url::Url;

/// Field-parsing logic applied to every successful fetch
///
/// Implementations add fields to the result's record, may mark it skipped,
/// and may queue follow-on tasks. The engine calls `process` from many task
/// units at once, so implementations must not rely on shared mutable state
/// without their own synchronization.
pub trait Extractor: Send + Sync {
    fn process(&self, result: &mut FetchResult);
}

impl<F> Extractor for F
where
    F: Fn(&mut FetchResult) + Send + Sync,
{
    fn process(&self, result: &mut FetchResult) {
        self(result)
    }
}

/// Metadata key holding the crawl depth of a task
pub const DEPTH_KEY: &str = "depth";

/// Built-in extractor that maps a site by following its links
///
/// For HTML pages it records `url`, `title` and `link-count`, and queues every
/// discovered link as a new HTML task one level deeper, up to the configured
/// maximum depth. Other content kinds only get `url` and `length`.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    max_depth: u32,
    same_host_only: bool,
}

impl LinkExtractor {
    pub fn new(config: &ExtractConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            same_host_only: config.same_host_only,
        }
    }
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::new(&ExtractConfig::default())
    }
}

/// Reads the crawl depth stored in a task's metadata (0 if absent)
///
/// Depths beyond `u32::MAX` saturate.
pub fn task_depth(task: &FetchTask) -> u32 {
    task.meta()
        .and_then(|meta| meta.get(DEPTH_KEY))
        .and_then(|depth| depth.as_u64())
        .map_or(0, |depth| u32::try_from(depth).unwrap_or(u32::MAX))
}

impl Extractor for LinkExtractor {
    fn process(&self, result: &mut FetchResult) {
        let url = result.task().url().to_string();
        result.add_field("url", url.clone());

        if result.task().kind() != &ContentKind::Html {
            let length = result.body().chars().count();
            result.add_field("length", length.to_string());
            return;
        }

        let Ok(base) = Url::parse(&url) else {
            result.set_skip(true);
            return;
        };
        let Some(document) = result.document() else {
            result.set_skip(true);
            return;
        };

        let outline = outline_document(document, &base);
        let depth = task_depth(result.task());

        if let Some(title) = &outline.title {
            result.add_field("title", title.clone());
        }
        result.add_field("link-count", outline.links.len().to_string());

        if depth >= self.max_depth {
            return;
        }

        for link in outline.links {
            if self.same_host_only && !same_host(&base, &link) {
                continue;
            }
            result.add_follow_on(
                FetchTask::new(link, ContentKind::Html).with_meta(json!({ DEPTH_KEY: depth + 1 })),
            );
        }
    }
}

fn same_host(base: &Url, link: &str) -> bool {
    Url::parse(link)
        .map(|url| url.host_str() == base.host_str() && url.port() == base.port())
        .unwrap_or(false)
}
