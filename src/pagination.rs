//! Cursor extraction for Confluence v2 pagination.
//!
//! The v2 API advertises the next page both in a `Link: <...>; rel="next"`
//! response header and in the body's `_links.next`; either may be present,
//! and the value may be origin-relative.

use reqwest::header::HeaderMap;
use serde_json::Value;

pub fn next_link_from_headers(headers: &HeaderMap) -> Option<String> {
    let link = headers.get("link")?.to_str().ok()?;
    for part in link.split(',') {
        let trimmed = part.trim();
        let url_start = trimmed.find('<')?;
        let url_end = trimmed.find('>')?;
        let url = &trimmed[url_start + 1..url_end];
        let rel = trimmed[url_end + 1..].trim();
        if rel.contains("rel=\"next\"") || rel.contains("rel=next") {
            return Some(url.to_string());
        }
    }
    None
}

pub fn next_link_from_body(value: &Value) -> Option<String> {
    value
        .get("_links")
        .and_then(|links| links.get("next"))
        .and_then(|next| next.as_str())
        .map(|s| s.to_string())
}

/// Resolve a pagination link against the request origin. Absolute links pass
/// through untouched.
pub fn absolutize_next_url(origin: &str, next: &str) -> String {
    if next.starts_with("http") {
        return next.to_string();
    }
    if next.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), next)
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), next)
    }
}
