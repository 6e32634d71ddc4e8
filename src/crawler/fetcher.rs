//! HTTP fetcher implementation
//!
//! This module handles all network access for the crawler:
//! - Building HTTP clients from the `[http]` configuration
//! - Sending the task's method, body, headers and cookies
//! - Routing through a proxy when one is set
//! - Installing per-task redirect hooks
//! - Decoding bodies to UTF-8 and parsing them by content kind

use crate::config::HttpConfig;
use crate::crawler::parser::jsonp_to_json;
use crate::task::{
    ContentKind, Cookie, FetchError, FetchResult, FetchTask, RedirectAction, RedirectHook,
    RedirectInfo,
};
use crate::ArachneError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, COOKIE};
use reqwest::{redirect::Policy, Client, ClientBuilder, Method, Proxy, Response, StatusCode};
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Performs the download for one task
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `task` and returns a fresh result
    ///
    /// Failures are reported on the result, never as a panic.
    async fn fetch(&self, task: Arc<FetchTask>) -> FetchResult;
}

/// Response data read off the wire, before kind-specific parsing
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    body: String,
}

/// [`Fetcher`] backed by `reqwest`
///
/// A shared client serves plain requests. Tasks with a proxy or a redirect
/// hook get a dedicated client built from the same settings.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```
/// use arachne::config::HttpConfig;
/// use arachne::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    client_builder(config).build()
}

fn client_builder(config: &HttpConfig) -> ClientBuilder {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
}

impl HttpFetcher {
    /// Creates a fetcher from the `[http]` configuration
    pub fn new(config: &HttpConfig) -> Result<Self, ArachneError> {
        let client = build_http_client(config)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Sends the request described by `task` and reads the body
    async fn download(&self, task: &FetchTask, method: Method) -> Result<RawResponse, FetchError> {
        let proxy = task.proxy().or(self.config.proxy.as_deref());

        let response = match proxy {
            Some(proxy) => self.send_via_proxy(task, proxy).await?,
            None => self.send(task, method).await?,
        };

        read_response(response).await
    }

    /// Sends the full request: method, body, headers, cookies, redirect hook
    async fn send(&self, task: &FetchTask, method: Method) -> Result<Response, FetchError> {
        let client = match task.redirect_policy() {
            Some(hook) => self.redirect_client(Arc::clone(hook))?,
            None => self.client.clone(),
        };

        let mut request = client
            .request(method, task.url())
            .headers(task.headers().clone());

        if !task.cookies().is_empty() {
            request = request.header(COOKIE, cookie_header(task.cookies()));
        }

        if !task.body().is_empty() {
            request = request.body(task.body().to_string());
        }

        request
            .send()
            .await
            .map_err(|e| FetchError::Transport(describe_error(&e)))
    }

    /// Sends a plain GET through `proxy`
    ///
    /// Only the URL is used. The task's method, headers, cookies and redirect
    /// hook do not apply on this path.
    async fn send_via_proxy(&self, task: &FetchTask, proxy: &str) -> Result<Response, FetchError> {
        tracing::debug!("Fetching {} through proxy {}", task.url(), proxy);

        let invalid_proxy = |message: String| FetchError::InvalidProxy {
            proxy: proxy.to_string(),
            message,
        };

        let proxy = Proxy::all(proxy).map_err(|e| invalid_proxy(e.to_string()))?;
        let client = client_builder(&self.config)
            .proxy(proxy)
            .build()
            .map_err(|e| invalid_proxy(e.to_string()))?;

        client
            .get(task.url())
            .send()
            .await
            .map_err(|e| FetchError::Transport(describe_error(&e)))
    }

    /// Builds a client that consults `hook` on every redirect
    fn redirect_client(&self, hook: RedirectHook) -> Result<Client, FetchError> {
        let policy = Policy::custom(move |attempt| {
            let info = RedirectInfo {
                status: attempt.status(),
                next: attempt.url().clone(),
                previous: attempt.previous().to_vec(),
            };

            match hook(&info) {
                RedirectAction::Follow => attempt.follow(),
                // Halting hands back the redirect response itself as a success
                RedirectAction::Halt => attempt.stop(),
                RedirectAction::Reject(message) => attempt.error(message),
            }
        });

        client_builder(&self.config)
            .redirect(policy)
            .build()
            .map_err(|e| FetchError::Transport(describe_error(&e)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, task: Arc<FetchTask>) -> FetchResult {
        let method = match validate_task(&task) {
            Ok(method) => method,
            Err(error) => {
                tracing::warn!("Rejecting task '{}': {}", task.url(), error);
                return FetchResult::failed(task, error);
            }
        };

        tracing::debug!("Fetching {} {} as {}", task.method(), task.url(), task.kind());

        // No result exists until the download is done: parsed documents must
        // not be held across an await point.
        let raw = match self.download(&task, method).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::debug!("Download of {} failed: {}", task.url(), error);
                return FetchResult::failed(task, error);
            }
        };

        build_result(task, raw)
    }
}

/// Checks everything that can be rejected without touching the network
fn validate_task(task: &FetchTask) -> Result<Method, FetchError> {
    if !task.kind().is_supported() {
        return Err(FetchError::UnsupportedKind(task.kind().to_string()));
    }

    if task.url().trim().is_empty() {
        return Err(FetchError::EmptyUrl);
    }

    Url::parse(task.url()).map_err(|e| FetchError::InvalidUrl {
        url: task.url().to_string(),
        message: e.to_string(),
    })?;

    Method::from_bytes(task.method().to_ascii_uppercase().as_bytes())
        .map_err(|_| FetchError::InvalidMethod(task.method().to_string()))
}

/// Reads status, headers, cookies and the UTF-8 decoded body
///
/// The charset declared in the response's Content-Type is used for decoding,
/// falling back to UTF-8.
async fn read_response(response: Response) -> Result<RawResponse, FetchError> {
    let status = response.status();
    let headers = response.headers().clone();
    let cookies = response
        .cookies()
        .map(|cookie| Cookie {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: cookie.domain().map(str::to_string),
            path: cookie.path().map(str::to_string),
        })
        .collect();

    let body = response
        .text_with_charset("utf-8")
        .await
        .map_err(|e| FetchError::Body(describe_error(&e)))?;

    Ok(RawResponse {
        status,
        headers,
        cookies,
        body,
    })
}

/// Turns a raw response into a result, parsing the body by content kind
fn build_result(task: Arc<FetchTask>, raw: RawResponse) -> FetchResult {
    let kind = task.kind().clone();
    let mut result = FetchResult::new(task);
    result.set_status(raw.status);
    result.set_headers(raw.headers);
    result.set_cookies(raw.cookies);

    match kind {
        ContentKind::Html => {
            result.set_document(Html::parse_document(&raw.body));
            result.set_body(raw.body);
        }
        ContentKind::Json | ContentKind::Jsonp => {
            let body = if kind == ContentKind::Jsonp {
                jsonp_to_json(&raw.body).to_string()
            } else {
                raw.body
            };

            match serde_json::from_str(&body) {
                Ok(value) => result.set_json(value),
                Err(e) => {
                    tracing::debug!("Invalid {} body from {}: {}", kind, result.task().url(), e);
                    result.set_error(FetchError::Decode {
                        kind: kind.to_string(),
                        message: e.to_string(),
                    });
                }
            }
            result.set_body(body);
        }
        ContentKind::Text => result.set_body(raw.body),
        ContentKind::Other(other) => result.set_error(FetchError::UnsupportedKind(other)),
    }

    result
}

/// Formats cookies as a single `Cookie` header value
fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Renders an error together with its chain of sources
fn describe_error(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
