//! Result normalization
//!
//! Strips two envelope artifacts workers put around tool output:
//! - an object whose only key is the empty string (`{"": value}`)
//! - a `content` array holding a single item whose `text` is itself JSON
//!
//! Children are normalized before their parent is inspected, so a shape that
//! only becomes peelable after its children were unwrapped is still peeled.
//! This keeps `normalize` idempotent.

use serde_json::{Map, Value};

/// Reshape a raw result into the plain value the caller wants
pub fn normalize(raw: Value) -> Value {
    match raw {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => {
            let rebuilt: Map<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect();
            peel(rebuilt)
        }
        primitive => primitive,
    }
}

fn peel(mut map: Map<String, Value>) -> Value {
    if map.len() == 1 {
        if let Some(inner) = map.remove("") {
            return inner;
        }
    }

    match embedded_json(&map) {
        Some(decoded) => normalize(decoded),
        None => Value::Object(map),
    }
}

/// Decoded `text` of a single content item, if it holds valid JSON
fn embedded_json(map: &Map<String, Value>) -> Option<Value> {
    let items = map.get("content")?.as_array()?;
    let [item] = items.as_slice() else {
        return None;
    };
    let text = item.get("text")?.as_str()?;
    serde_json::from_str(text).ok()
}
