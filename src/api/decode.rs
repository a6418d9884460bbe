//! Response-shape normalization
//!
//! The backend wraps payloads inconsistently: a list may arrive as a bare
//! array, `{"data": [...]}`, `{"items": [...]}`, `{"messages": [...]}`,
//! `{"users": [...]}`, or nested as `{"data": {"items": [...]}}`; singletons
//! may or may not be `data`-wrapped. Every accepted shape is enumerated here,
//! in one place, and anything else decodes to an empty result instead of an
//! error. That trades silent data loss for availability, which is the
//! behavior the rest of the client is built around.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Keys probed, in priority order, when a list arrives wrapped in an object
const LIST_KEYS: [&str; 4] = ["data", "items", "messages", "users"];

/// Normalize a list payload to a plain vector
///
/// Accepted shapes, first match wins: bare array; `data` array; `data` object
/// holding an `items` or `messages` array; `items` array; `messages` array;
/// `users` array. Any other shape yields an empty vector.
pub fn list<T: DeserializeOwned>(value: Value) -> Vec<T> {
    match value {
        Value::Array(_) => elements(value),
        Value::Object(map) => {
            for key in LIST_KEYS {
                match map.get(key) {
                    Some(Value::Array(_)) => return elements(map[key].clone()),
                    Some(Value::Object(inner)) if key == "data" => {
                        for nested in ["items", "messages"] {
                            if let Some(Value::Array(_)) = inner.get(nested) {
                                return elements(inner[nested].clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Normalize a payload that is either a list or a single `data`-wrapped item
///
/// Like [`list`], but a `data` field holding a lone object decodes to a
/// one-element vector. The notes endpoint answers both ways.
pub fn list_or_single<T: DeserializeOwned>(value: Value) -> Vec<T> {
    if let Value::Object(map) = &value {
        if let Some(inner @ Value::Object(_)) = map.get("data") {
            let nested: Vec<T> = list(inner.clone());
            if !nested.is_empty() {
                return nested;
            }
            return single(inner.clone()).into_iter().collect();
        }
    }
    list(value)
}

/// Normalize a singleton payload
///
/// Unwraps `{"data": {...}}` when present, otherwise decodes the value
/// itself. Returns `None` for anything that doesn't match.
pub fn item<T: DeserializeOwned>(value: Value) -> Option<T> {
    let wrapped = match &value {
        Value::Object(map) => match map.get("data") {
            Some(Value::Object(_)) => Some(map["data"].clone()),
            _ => None,
        },
        _ => return None,
    };

    match wrapped {
        Some(inner) => single(inner).or_else(|| single(value)),
        None => single(value),
    }
}

fn elements<T: DeserializeOwned>(value: Value) -> Vec<T> {
    serde_json::from_value(value).unwrap_or_else(|e| {
        debug!("Dropping list payload with unexpected elements: {}", e);
        Vec::new()
    })
}

fn single<T: DeserializeOwned>(value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(item) => Some(item),
        Err(e) => {
            debug!("Dropping singleton payload with unexpected shape: {}", e);
            None
        }
    }
}
