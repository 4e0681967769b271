//! Sanitization and validation of fetched off-chain metadata JSON.
//!
//! Text fields are truncated before HTML stripping to bound worst-case CPU
//! on a hostile payload; structured arrays are capped before their elements
//! are mapped, for the same reason.

use reqwest::Url;

/// Text fields are truncated to this many characters before HTML is stripped.
const TRUNCATE_CHARS: usize = 1000;

/// Maximum elements kept from a structured array field (services, etc.).
const MAX_ARRAY_ELEMENTS: usize = 50;

/// Allowed schemes for URL-typed metadata fields.
const ALLOWED_URL_SCHEMES: &[&str] = &["https", "http", "ipfs", "ar"];

/// Truncate to [`TRUNCATE_CHARS`] characters (not bytes, to stay on a UTF-8
/// boundary), then strip anything that looks like an HTML tag.
#[must_use]
pub fn sanitize_text(input: &str) -> String {
    let truncated: String = input.chars().take(TRUNCATE_CHARS).collect();
    strip_html_tags(&truncated)
}

fn strip_html_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Returns `true` if `value` parses as a URL with an allowed scheme.
#[must_use]
pub fn is_allowed_url(value: &str) -> bool {
    Url::parse(value)
        .is_ok_and(|url| ALLOWED_URL_SCHEMES.contains(&url.scheme()))
}

/// Cap a slice of raw JSON array elements to [`MAX_ARRAY_ELEMENTS`] *before*
/// the caller maps/validates each one, bounding worst-case CPU on an
/// adversarial response with an enormous array.
#[must_use]
pub fn cap_array(values: &[serde_json::Value]) -> &[serde_json::Value] {
    let len = values.len().min(MAX_ARRAY_ELEMENTS);
    &values[..len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_html_tags() {
        assert_eq!(sanitize_text("<b>hi</b> there"), "hi there");
        assert_eq!(sanitize_text("plain text"), "plain text");
    }

    #[test]
    fn truncates_before_stripping() {
        let huge = "a".repeat(5000);
        assert_eq!(sanitize_text(&huge).len(), TRUNCATE_CHARS);
    }

    #[test]
    fn validates_url_scheme_allowlist() {
        assert!(is_allowed_url("https://example.com"));
        assert!(is_allowed_url("ipfs://cid"));
        assert!(!is_allowed_url("javascript:alert(1)"));
        assert!(!is_allowed_url("not a url"));
    }

    #[test]
    fn caps_array_before_mapping() {
        let values: Vec<serde_json::Value> = (0..200).map(|i| serde_json::json!(i)).collect();
        assert_eq!(cap_array(&values).len(), MAX_ARRAY_ELEMENTS);
    }
}
