//! Dotted path extraction over JSON documents
//!
//! Paths are dot-separated segments. On objects a segment is a key, on arrays
//! it is a zero-based index or `#` for the array length. A literal dot inside a
//! key is written `\.`. A `#` followed by more segments maps the rest of the
//! path over every element:
//!
//! ```
//! use rabbit_stalker::field_path::{canonical_string, get_path};
//! use serde_json::json;
//!
//! let doc = json!({"consumer_details": [{"prefetch_count": 10}, {"prefetch_count": 5}]});
//! assert_eq!(canonical_string(get_path(&doc, "consumer_details.#").as_ref()), "2");
//! assert_eq!(canonical_string(get_path(&doc, "consumer_details.1.prefetch_count").as_ref()), "5");
//! assert_eq!(canonical_string(get_path(&doc, "consumer_details.#.prefetch_count").as_ref()), "[10,5]");
//! ```

use serde_json::Value;

/// Split a path into segments, honouring `\.` escapes
fn segments(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => current.push(next),
                None => current.push('\\'),
            },
            '.' => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    out.push(current);
    out
}

fn walk(value: &Value, segments: &[String]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };

    match value {
        Value::Object(map) => walk(map.get(head.as_str())?, rest),
        Value::Array(items) if head == "#" => {
            if rest.is_empty() {
                Some(Value::from(items.len()))
            } else {
                Some(Value::Array(
                    items.iter().filter_map(|item| walk(item, rest)).collect(),
                ))
            }
        }
        Value::Array(items) => {
            let index: usize = head.parse().ok()?;
            walk(items.get(index)?, rest)
        }
        _ => None,
    }
}

/// Extract the value at `path`, or `None` when any segment does not resolve
///
/// An empty path returns `None`.
pub fn get_path(doc: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return None;
    }
    walk(doc, &segments(path))
}

/// String form used to compare a document field with an expected value
///
/// Strings are returned without quotes, numbers in plain decimal notation,
/// booleans as `true`/`false`, objects and arrays as compact JSON. Null and
/// missing fields are the empty string.
pub fn canonical_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
            }
        }
        Some(other) => other.to_string(),
    }
}
