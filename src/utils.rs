//! Utility functions for the xmltv-augment application
//!
//! - URL normalization for the listings services
//! - XMLTV timestamp parsing and formatting (`utils::time`)

pub mod time;

/// Sanitize a base URL by removing trailing slashes and ensuring proper format
pub fn sanitize_base_url(base_url: &str) -> String {
    let mut url = base_url.trim().to_string();

    // Remove trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Ensure we have a scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{}", url);
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_base_url() {
        assert_eq!(
            sanitize_base_url("https://example.net/augment/"),
            "https://example.net/augment"
        );
        assert_eq!(
            sanitize_base_url("example.net/augment"),
            "http://example.net/augment"
        );
        assert_eq!(
            sanitize_base_url("  http://example.net  "),
            "http://example.net"
        );
    }
}
