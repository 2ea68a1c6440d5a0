//! Page envelope handling
//!
//! Harvest list endpoints wrap their items in an object keyed by the resource
//! name (`{"clients": [...], "page": 1, "links": {...}}`), a few return a bare
//! array, and singleton resources return one object. These helpers turn any
//! of those into items and decide whether another page exists.

use serde_json::Value;

/// Envelope keys that never hold the item list
pub const METADATA_FIELDS: &[&str] = &[
    "page",
    "per_page",
    "total_pages",
    "total_entries",
    "links",
    "next_page",
];

/// Items found in one page
#[derive(Debug, Clone, PartialEq)]
pub enum PageItems {
    /// The page carried a list of items
    List(Vec<Value>),
    /// No list found; the payload itself is the single item
    Single(Value),
}

impl PageItems {
    /// Number of items represented
    pub fn len(&self) -> usize {
        match self {
            PageItems::List(items) => items.len(),
            PageItems::Single(_) => 1,
        }
    }

    /// Whether there are no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pull the items out of a page payload
///
/// A bare array is used as is. Otherwise the first list-valued, non-metadata
/// key wins, in document order.
pub fn extract_items(payload: Value) -> PageItems {
    match payload {
        Value::Array(items) => PageItems::List(items),
        Value::Object(mut map) => {
            let key = map
                .iter()
                .find(|(k, v)| v.is_array() && !METADATA_FIELDS.contains(&k.as_str()))
                .map(|(k, _)| k.clone());

            match key.and_then(|k| map.remove(&k)) {
                Some(Value::Array(items)) => PageItems::List(items),
                Some(other) => PageItems::Single(other),
                None => PageItems::Single(Value::Object(map)),
            }
        }
        other => PageItems::Single(other),
    }
}

/// Whether the payload announces a following page
///
/// Both conventions are honoured: a non-null `next_page` or a non-null
/// `links.next`.
pub fn has_next_page(payload: &Value) -> bool {
    let Some(map) = payload.as_object() else {
        return false;
    };

    if map.get("next_page").is_some_and(|v| !v.is_null()) {
        return true;
    }

    map.get("links")
        .and_then(Value::as_object)
        .and_then(|links| links.get("next"))
        .is_some_and(|v| !v.is_null())
}
