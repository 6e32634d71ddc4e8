//! Header files: request headers stored as a flat JSON object

use crate::ArachneError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::path::Path;

/// Loads request headers from a JSON file
///
/// The file must contain a single object mapping header names to string
/// values, for example:
///
/// ```json
/// { "User-Agent": "Mozilla/5.0", "Referer": "https://example.com/" }
/// ```
pub fn load_header_file(path: &Path) -> Result<HeaderMap, ArachneError> {
    let content = std::fs::read_to_string(path)?;
    parse_headers(&content)
}

/// Parses a JSON header object into a [`HeaderMap`]
pub fn parse_headers(content: &str) -> Result<HeaderMap, ArachneError> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let object = value
        .as_object()
        .ok_or_else(|| ArachneError::InvalidHeader("header file must be a JSON object".into()))?;

    let mut headers = HeaderMap::with_capacity(object.len());
    for (name, value) in object {
        let value = value.as_str().ok_or_else(|| {
            ArachneError::InvalidHeader(format!("value of header '{}' is not a string", name))
        })?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ArachneError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ArachneError::InvalidHeader(format!("{}: {}", name, e)))?;
        headers.append(name, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_headers() {
        let headers =
            parse_headers(r#"{"User-Agent": "TestBot/1.0", "Referer": "https://example.com/"}"#)
                .unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("user-agent").unwrap(), "TestBot/1.0");
        assert_eq!(headers.get("referer").unwrap(), "https://example.com/");
    }

    #[test]
    fn test_parse_headers_rejects_non_object() {
        let result = parse_headers(r#"["User-Agent"]"#);
        assert!(matches!(result, Err(ArachneError::InvalidHeader(_))));
    }

    #[test]
    fn test_parse_headers_rejects_non_string_value() {
        let result = parse_headers(r#"{"Max-Forwards": 3}"#);
        assert!(matches!(result, Err(ArachneError::InvalidHeader(_))));
    }

    #[test]
    fn test_parse_headers_rejects_bad_name() {
        let result = parse_headers(r#"{"Bad Header": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_header_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"Cookie": "a=1"}"#).unwrap();
        file.flush().unwrap();

        let headers = load_header_file(file.path()).unwrap();
        assert_eq!(headers.get("cookie").unwrap(), "a=1");
    }
}
