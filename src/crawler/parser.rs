//! Page parsing helpers
//!
//! This module handles:
//! - Pulling the title and followable links out of an HTML document
//! - Unwrapping JSONP responses to bare JSON

use scraper::{Html, Selector};
use url::Url;

/// Title and links found on an HTML page
#[derive(Debug, Clone, Default)]
pub struct PageOutline {
    /// Trimmed `<title>` text, if non-empty
    pub title: Option<String>,

    /// Absolute http(s) links, in document order, duplicates removed
    pub links: Vec<String>,
}

/// Outlines an already parsed document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links
/// - Anything that does not resolve to http or https
///
/// # Example
///
/// ```
/// use arachne::crawler::outline_document;
/// use scraper::Html;
/// use url::Url;
///
/// let html = Html::parse_document(
///     r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#,
/// );
/// let base = Url::parse("https://example.com/").unwrap();
/// let outline = outline_document(&html, &base);
/// assert_eq!(outline.title.as_deref(), Some("Test"));
/// assert_eq!(outline.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn outline_document(document: &Html, base_url: &Url) -> PageOutline {
    PageOutline {
        title: page_title(document),
        links: page_links(document, base_url),
    }
}

/// Parses raw HTML and outlines it
pub fn outline_html(html: &str, base_url: &Url) -> PageOutline {
    outline_document(&Html::parse_document(html), base_url)
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

fn page_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut push = |href: &str| {
        if let Some(url) = resolve_link(href, base_url) {
            if !links.contains(&url) {
                links.push(url);
            }
        }
    };

    if let Ok(anchors) = Selector::parse("a[href]:not([download])") {
        for element in document.select(&anchors) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// Resolves `href` against `base_url`, or returns `None` if it is not a
/// followable http(s) link
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }

    absolute.set_fragment(None);
    Some(absolute.to_string())
}

/// Strips a JSONP call wrapper, returning the JSON inside
///
/// Everything between the first `(` and the last `)` is kept. Input without a
/// wrapper is returned trimmed.
pub fn jsonp_to_json(body: &str) -> &str {
    let body = body.trim();
    match (body.find('('), body.rfind(')')) {
        (Some(start), Some(end)) if start < end => body[start + 1..end].trim(),
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        outline_html(html, &base_url()).links
    }

    #[test]
    fn test_title() {
        let outline = outline_html(
            "<html><head><title>  Test Page  </title></head><body></body></html>",
            &base_url(),
        );
        assert_eq!(outline.title.as_deref(), Some("Test Page"));
    }

    #[test]
    fn test_missing_or_blank_title() {
        assert_eq!(outline_html("<html><body></body></html>", &base_url()).title, None);
        assert_eq!(
            outline_html("<html><head><title> </title></head></html>", &base_url()).title,
            None
        );
    }

    #[test]
    fn test_absolute_and_relative_links() {
        let found = links(
            r#"<body>
                <a href="https://other.com/page">1</a>
                <a href="/root">2</a>
                <a href="sibling">3</a>
            </body>"#,
        );
        assert_eq!(
            found,
            vec![
                "https://other.com/page",
                "https://example.com/root",
                "https://example.com/sibling",
            ]
        );
    }

    #[test]
    fn test_skipped_links() {
        let found = links(
            r##"<body>
                <a href="javascript:void(0)">js</a>
                <a href="JavaScript:alert(1)">js upper</a>
                <a href="mailto:test@example.com">mail</a>
                <a href="tel:+1234567890">tel</a>
                <a href="data:text/html,hi">data</a>
                <a href="#section">fragment</a>
                <a href="/file.pdf" download>download</a>
                <a href="ftp://example.com/file">ftp</a>
                <a href="">empty</a>
            </body>"##,
        );
        assert!(found.is_empty(), "unexpected links: {:?}", found);
    }

    #[test]
    fn test_nofollow_links_are_kept() {
        let found = links(r#"<a href="/page2" rel="nofollow">Link</a>"#);
        assert_eq!(found, vec!["https://example.com/page2"]);
    }

    #[test]
    fn test_canonical_link() {
        let found = links(
            r#"<html><head><link rel="canonical" href="https://example.com/canonical"></head></html>"#,
        );
        assert_eq!(found, vec!["https://example.com/canonical"]);
    }

    #[test]
    fn test_links_deduplicated_without_fragments() {
        let found = links(
            r#"<a href="/a">1</a><a href="/a#top">2</a><a href="/b">3</a><a href="/a">4</a>"#,
        );
        assert_eq!(found, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn test_jsonp_to_json() {
        assert_eq!(jsonp_to_json(r#"callback({"a":1});"#), r#"{"a":1}"#);
        assert_eq!(jsonp_to_json(r#"  jQuery123_456( [1,2,3] )  "#), "[1,2,3]");
        assert_eq!(jsonp_to_json(r#"cb({"f":"(x)"})"#), r#"{"f":"(x)"}"#);
    }

    #[test]
    fn test_jsonp_to_json_without_wrapper() {
        assert_eq!(jsonp_to_json(r#" {"a":1} "#), r#"{"a":1}"#);
        assert_eq!(jsonp_to_json(")broken("), ")broken(");
    }
}
