//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod backoff;

use anyhow::{Context, Result};
use url::Url;

/// Extract host from URL
pub fn extract_host(url: &str) -> Result<String> {
    let parsed = Url::parse(url).context("Invalid URL")?;

    parsed
        .host_str()
        .map(|s| s.to_string())
        .context("No host in URL")
}

/// Check that a URL is absolute http(s) with a host
pub fn is_valid_page_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

/// Truncate text to a maximum length
///
/// Used to cap stored error messages so a verbose upstream body does not
/// bloat the tracking table.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        let host = extract_host("https://forge.example.com/blog/launch");
        assert_eq!(host.unwrap(), "forge.example.com");

        assert!(extract_host("not a url").is_err());
    }

    #[test]
    fn test_is_valid_page_url() {
        assert!(is_valid_page_url("https://example.com/blog/x"));
        assert!(is_valid_page_url("http://example.com/"));
        assert!(!is_valid_page_url("ftp://example.com/x"));
        assert!(!is_valid_page_url("/blog/x"));
        assert!(!is_valid_page_url(""));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("very long text here", 10), "very lo...");
    }
}
