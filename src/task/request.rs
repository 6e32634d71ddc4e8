//! Fetch task definitions
//!
//! A [`FetchTask`] describes one unit of crawl work: what to retrieve, how to
//! send the request, and how to interpret the response body.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use url::Url;

use super::headers::load_header_file;

/// Expected content kind of a response body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// HTML page, parsed into a traversable document
    Html,

    /// JSON document, parsed into a structured value
    Json,

    /// JSON wrapped in a function call, unwrapped before parsing
    Jsonp,

    /// Plain text, stored as-is
    Text,

    /// Any kind the fetcher does not understand
    Other(String),
}

impl ContentKind {
    /// Returns the canonical lowercase name of this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::Jsonp => "jsonp",
            Self::Text => "text",
            Self::Other(kind) => kind,
        }
    }

    /// Returns true if the fetcher knows how to handle this kind
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for ContentKind {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" => Self::Html,
            "json" => Self::Json,
            "jsonp" => Self::Jsonp,
            "text" => Self::Text,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name/value cookie pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,

    /// Domain attribute, only populated on response cookies
    pub domain: Option<String>,

    /// Path attribute, only populated on response cookies
    pub path: Option<String>,
}

impl Cookie {
    /// Creates a request cookie with no attributes
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }
}

/// Information about a pending redirect, handed to a task's redirect hook
#[derive(Debug, Clone)]
pub struct RedirectInfo {
    /// Status code of the redirect response
    pub status: StatusCode,

    /// Location the client is about to follow
    pub next: Url,

    /// URLs already visited in this chain, oldest first
    pub previous: Vec<Url>,
}

/// Decision returned by a redirect hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    /// Follow the redirect
    Follow,

    /// Stop here and return the redirect response as a successful fetch
    Halt,

    /// Abort the request; the fetch fails with this message
    Reject(String),
}

/// Hook deciding whether a redirect should be followed
pub type RedirectHook = Arc<dyn Fn(&RedirectInfo) -> RedirectAction + Send + Sync>;

/// An immutable description of one unit of crawl work
///
/// Tasks are assembled with the consuming `with_*` methods and are not changed
/// once pushed into a queue. Call sites that need a variation build a new task.
#[derive(Clone)]
pub struct FetchTask {
    url: String,
    kind: ContentKind,
    method: String,
    body: String,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    proxy: Option<String>,
    redirect: Option<RedirectHook>,
    tag: String,
    meta: Option<serde_json::Value>,
}

impl FetchTask {
    /// Creates a GET task for `url`, expecting content of `kind`
    ///
    /// # Example
    ///
    /// ```
    /// use arachne::task::{ContentKind, FetchTask};
    ///
    /// let task = FetchTask::new("https://example.com/", "html").with_tag("index");
    /// assert_eq!(task.kind(), &ContentKind::Html);
    /// assert_eq!(task.method(), "GET");
    /// ```
    pub fn new(url: impl Into<String>, kind: impl Into<ContentKind>) -> Self {
        Self {
            url: url.into(),
            kind: kind.into(),
            method: "GET".to_string(),
            body: String::new(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            proxy: None,
            redirect: None,
            tag: String::new(),
            meta: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Replaces the whole header set
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Appends one header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replaces the header set with the one stored in a JSON header file
    ///
    /// A missing file leaves the task unchanged. A file that exists but can't
    /// be read or parsed is an error.
    pub fn with_header_file(self, path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            tracing::debug!("Header file {} not found, keeping headers", path.display());
            return Ok(self);
        }
        let headers = load_header_file(path)?;
        Ok(self.with_headers(headers))
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Installs a redirect hook, consulted on every redirect hop
    pub fn with_redirect_policy<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RedirectInfo) -> RedirectAction + Send + Sync + 'static,
    {
        self.redirect = Some(Arc::new(hook));
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> &ContentKind {
        &self.kind
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn redirect_policy(&self) -> Option<&RedirectHook> {
        self.redirect.as_ref()
    }

    /// Opaque label used to tell otherwise identical URLs apart
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn meta(&self) -> Option<&serde_json::Value> {
        self.meta.as_ref()
    }
}

impl fmt::Debug for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchTask")
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("body_len", &self.body.len())
            .field("headers", &self.headers.len())
            .field("cookies", &self.cookies.len())
            .field("proxy", &self.proxy)
            .field("redirect", &self.redirect.is_some())
            .field("tag", &self.tag)
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::USER_AGENT;

    #[test]
    fn test_content_kind_from_str() {
        assert_eq!(ContentKind::from("html"), ContentKind::Html);
        assert_eq!(ContentKind::from("JSON"), ContentKind::Json);
        assert_eq!(ContentKind::from("jsonp"), ContentKind::Jsonp);
        assert_eq!(ContentKind::from(" text "), ContentKind::Text);
        assert_eq!(ContentKind::from("xml"), ContentKind::Other("xml".to_string()));
        assert!(!ContentKind::from("xml").is_supported());
    }

    #[test]
    fn test_new_task_defaults() {
        let task = FetchTask::new("https://example.com/", "text");

        assert_eq!(task.url(), "https://example.com/");
        assert_eq!(task.method(), "GET");
        assert!(task.body().is_empty());
        assert!(task.headers().is_empty());
        assert!(task.proxy().is_none());
        assert!(task.redirect_policy().is_none());
        assert!(task.meta().is_none());
    }

    #[test]
    fn test_builder_methods() {
        let task = FetchTask::new("https://example.com/api", "json")
            .with_method("POST")
            .with_body("q=1")
            .with_header(USER_AGENT, HeaderValue::from_static("test"))
            .with_cookie(Cookie::new("session", "abc"))
            .with_proxy("http://127.0.0.1:3128")
            .with_tag("search")
            .with_meta(serde_json::json!({ "depth": 2 }));

        assert_eq!(task.method(), "POST");
        assert_eq!(task.body(), "q=1");
        assert_eq!(task.headers().get(USER_AGENT).unwrap(), "test");
        assert_eq!(task.cookies().len(), 1);
        assert_eq!(task.proxy(), Some("http://127.0.0.1:3128"));
        assert_eq!(task.tag(), "search");
        assert_eq!(task.meta().unwrap()["depth"], 2);
    }

    #[test]
    fn test_redirect_hook_is_shared_between_clones() {
        let task = FetchTask::new("https://example.com/", "html")
            .with_redirect_policy(|_| RedirectAction::Halt);
        let copy = task.clone();

        let info = RedirectInfo {
            status: StatusCode::FOUND,
            next: Url::parse("https://example.com/next").unwrap(),
            previous: vec![],
        };
        let hook = copy.redirect_policy().unwrap();
        assert_eq!(hook(&info), RedirectAction::Halt);
    }

    #[test]
    fn test_missing_header_file_keeps_task() {
        let task = FetchTask::new("https://example.com/", "html")
            .with_header(USER_AGENT, HeaderValue::from_static("keep"))
            .with_header_file(Path::new("/nonexistent/headers.json"))
            .unwrap();

        assert_eq!(task.headers().get(USER_AGENT).unwrap(), "keep");
    }
}
