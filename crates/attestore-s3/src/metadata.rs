//! `X-Amz-Meta-*` request/response header handling.

use axum::http::HeaderMap;
use std::collections::HashMap;

const PREFIX: &str = "x-amz-meta-";

/// Collects user metadata from request headers, stripping the prefix.
/// Header names are case-insensitive; first occurrence of a key wins.
pub fn extract(headers: &HeaderMap) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    for (name, value) in headers {
        let name = name.as_str().to_ascii_lowercase();
        if let Some(key) = name.strip_prefix(PREFIX) {
            if let Ok(value) = value.to_str() {
                metadata.entry(key.to_string()).or_insert_with(|| value.to_string());
            }
        }
    }
    metadata
}

/// Re-emits stored metadata onto a response builder with the prefix
/// restored.
pub fn apply(mut builder: axum::http::response::Builder, metadata: &HashMap<String, String>) -> axum::http::response::Builder {
    for (key, value) in metadata {
        builder = builder.header(format!("{PREFIX}{key}"), value);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn strips_prefix_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Amz-Meta-Owner", HeaderValue::from_static("alice"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        let meta = extract(&headers);
        assert_eq!(meta.get("owner"), Some(&"alice".to_string()));
        assert_eq!(meta.len(), 1);
    }
}
