//! JSON export and import
//!
//! Export is lossy by construction: timestamps become RFC 3339 strings,
//! identifiers become strings, binary payloads become base64. Import never
//! infers those types back; strings stay text.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use super::{Key, Map, Value};

impl Value {
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int32(n) => JsonValue::from(*n),
            Value::Int64(n) => JsonValue::from(*n),
            Value::Float(x) => Number::from_f64(*x).map_or(JsonValue::Null, JsonValue::Number),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Binary(b) => JsonValue::String(STANDARD.encode(&b.bytes)),
            Value::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
            Value::Timestamp(t) => JsonValue::String(t.to_rfc3339()),
            Value::ObjectId(id) => JsonValue::String(id.to_hex()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
            Value::Regex(p) => JsonValue::String(p.to_string()),
            Value::List(items) | Value::Set(items) => {
                JsonValue::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => JsonValue::Object(map_to_json(map)),
        }
    }

    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => i32::try_from(i).map_or(Value::Int64(i), Value::Int32),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::Text(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(obj) => Value::Map(map_from_json(obj)),
        }
    }
}

pub(crate) fn map_to_json(map: &Map) -> JsonMap<String, JsonValue> {
    map.iter()
        .map(|(k, v)| (k.to_string(), v.to_json()))
        .collect()
}

pub(crate) fn map_from_json(obj: &JsonMap<String, JsonValue>) -> Map {
    obj.iter()
        .map(|(k, v)| (Key::Text(k.clone()), Value::from_json(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Binary, ObjectId};
    use serde_json::json;

    #[test]
    fn test_import_numbers() {
        assert_eq!(Value::from_json(&json!(3)), Value::Int32(3));
        assert_eq!(Value::from_json(&json!(5_000_000_000i64)), Value::Int64(5_000_000_000));
        assert_eq!(Value::from_json(&json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn test_import_nested() {
        let value = Value::from_json(&json!({"a": [1, "x", null], "b": {"c": true}}));
        assert_eq!(value.get_path("a.1"), Some(&Value::from("x")));
        assert_eq!(value.get_path("b.c"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_export_special_scalars() {
        let id = ObjectId::new();
        assert_eq!(Value::ObjectId(id).to_json(), json!(id.to_hex()));
        assert_eq!(Value::Binary(Binary::new(vec![1, 2, 3])).to_json(), json!("AQID"));
        assert_eq!(Value::Float(f64::NAN).to_json(), JsonValue::Null);
    }

    #[test]
    fn test_export_integer_keys() {
        let mut map = Map::new();
        map.insert(Key::Int(3), Value::from("x"));
        assert_eq!(Value::Map(map).to_json(), json!({"3": "x"}));
    }
}
