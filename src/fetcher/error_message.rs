//! Human-readable messages from API error bodies

use reqwest::StatusCode;
use serde_json::Value;

use crate::downloader::config::ERROR_MESSAGE_MAX_LENGTH;

/// Keys searched at the top level of an error body, in order
pub const MESSAGE_KEYS: &[&str] = &["message", "error", "error_description", "detail"];

/// Keys searched inside a nested error object
pub const NESTED_MESSAGE_KEYS: &[&str] = &["message", "error", "detail"];

/// Best-effort message for a failed response
///
/// Tries the JSON keys above, then the first 200 characters of the body, then
/// the reason phrase, then `HTTP <status>`.
pub fn extract_error_message(body: &str, status: StatusCode) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(message) = message_from_object(&map, MESSAGE_KEYS) {
            return message;
        }
    }

    if !body.is_empty() {
        return body.chars().take(ERROR_MESSAGE_MAX_LENGTH).collect();
    }

    match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => format!("HTTP {}", status.as_u16()),
    }
}

fn message_from_object(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        let Some(value) = map.get(*key) else {
            continue;
        };
        let found = match value {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items.first().map(|first| match first {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            Value::Object(nested) => message_from_object(nested, NESTED_MESSAGE_KEYS),
            _ => None,
        };
        if let Some(message) = found.filter(|m| !m.is_empty()) {
            return Some(message);
        }
    }
    None
}
