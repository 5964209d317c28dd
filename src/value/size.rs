//! Encoded document size
//!
//! Sizes follow the binary document encoding of the store: a document is a
//! 4-byte length, one element per entry (type byte, key cstring, payload)
//! and a trailing zero byte. Lists encode as documents keyed "0", "1", ...

use super::{Map, Value};

/// Encoded size in bytes of a top-level document.
pub fn document_size(map: &Map) -> usize {
    let entries: usize = map
        .iter()
        .map(|(key, value)| element_size(&key.to_string(), value))
        .sum();
    4 + entries + 1
}

fn list_size(items: &[Value]) -> usize {
    let entries: usize = items
        .iter()
        .enumerate()
        .map(|(i, value)| element_size(&i.to_string(), value))
        .sum();
    4 + entries + 1
}

fn element_size(key: &str, value: &Value) -> usize {
    1 + key.len() + 1 + payload_size(value)
}

fn payload_size(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int32(_) => 4,
        Value::Int64(_) | Value::Float(_) | Value::Timestamp(_) => 8,
        Value::Text(s) => 4 + s.len() + 1,
        Value::Binary(b) => 4 + 1 + b.bytes.len(),
        Value::Bytes(b) => 4 + 1 + b.len(),
        Value::Uuid(_) => 4 + 1 + 16,
        Value::ObjectId(_) => 12,
        Value::Regex(p) => p.pattern().len() + 1 + p.options().len() + 1,
        Value::List(items) | Value::Set(items) => list_size(items),
        Value::Map(map) => document_size(map),
    }
}
