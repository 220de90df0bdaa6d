//! Routing of a fetched response by its declared content type.

use crate::ScrapeError;
use serde_json::Value;

pub const MISSING_KEY: &str = "Please provide a key using the --key option.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Json,
}

impl ContentKind {
    /// First match wins and HTML is checked before JSON.
    pub fn classify(content_type: &str) -> Result<ContentKind, ScrapeError> {
        if content_type.contains("html") {
            Ok(ContentKind::Html)
        } else if content_type.contains("json") {
            Ok(ContentKind::Json)
        } else {
            Err(ScrapeError::UnsupportedContentType(content_type.to_string()))
        }
    }
}

/// Follows a dotted key path (`"a.b.0.c"`) into `value`. Numeric segments
/// index arrays. Stops at the first missing segment.
pub fn lookup_key<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

pub fn describe_lookup(key: &str, found: Option<&Value>) -> String {
    match found {
        Some(Value::String(s)) => format!("Value for key \"{}\": {}", key, s),
        Some(value) => format!("Value for key \"{}\": {}", key, value),
        None => format!("Key \"{}\" not found in JSON response.", key),
    }
}
