//! Document value model
//!
//! Values mirror the storage type universe of the document store: the
//! closed set of scalar kinds plus lists and maps. `Set` exists only in
//! memory and reaches storage through a custom type conversion.

mod json;
mod path;
mod size;
mod types;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::schema::TypeTag;

pub(crate) use json::{map_from_json, map_to_json};
pub use path::FieldPath;
pub use size::document_size;
pub use types::{Binary, ObjectId, Pattern, ScalarError};

/// Ordered document mapping.
pub type Map = BTreeMap<Key, Value>;

/// Map key.
///
/// Declared structure fields are always text keys. Integer keys only occur
/// beneath typed raw mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Text(s) => Some(s),
            Key::Int(_) => None,
        }
    }

    /// The key viewed as a value, for key type checks.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Text(s) => Value::Text(s.clone()),
            Key::Int(n) => Value::Int64(*n),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => write!(f, "{}", s),
            Key::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

/// A document value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f64),
    Text(String),
    Binary(Binary),
    Timestamp(DateTime<Utc>),
    ObjectId(ObjectId),
    Regex(Pattern),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Map),
    /// In-memory set, insertion ordered and free of duplicates.
    Set(Vec<Value>),
}

impl Value {
    /// Builds a set, dropping duplicate members.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        Value::Set(members)
    }

    /// Empty map value.
    pub fn map() -> Self {
        Value::Map(Map::new())
    }

    /// Runtime type tag. `None` for null.
    pub fn tag(&self) -> Option<TypeTag> {
        let tag = match self {
            Value::Null => return None,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int32(_) | Value::Int64(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Text(_) => TypeTag::Text,
            Value::Binary(_) => TypeTag::Binary,
            Value::Timestamp(_) => TypeTag::Timestamp,
            Value::ObjectId(_) => TypeTag::ObjectId,
            Value::Regex(_) => TypeTag::Regex,
            Value::Uuid(_) => TypeTag::Uuid,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::List(_) => TypeTag::List,
            Value::Map(_) => TypeTag::Map,
            Value::Set(_) => TypeTag::Set,
        };
        Some(tag)
    }

    /// Type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        self.tag().map_or("null", |t| t.name())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a value by dotted path (`a.b`, `a.0`, `a[0].b`).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        FieldPath::parse(path).lookup(self)
    }

    /// Mutable lookup by dotted path.
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        FieldPath::parse(path).lookup_mut(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Binary(b) => write!(f, "Binary({}, {} bytes)", b.subtype, b.bytes.len()),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::ObjectId(id) => write!(f, "ObjectId('{}')", id),
            Value::Regex(p) => write!(f, "{}", p),
            Value::Uuid(u) => write!(f, "UUID('{}')", u),
            Value::Bytes(b) => write!(f, "bytes({})", b.len()),
            Value::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Value::Set(items) => {
                write!(f, "{{")?;
                write_joined(f, items)?;
                write!(f, "}}")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<Binary> for Value {
    fn from(b: Binary) -> Self {
        Value::Binary(b)
    }
}

impl From<Pattern> for Value {
    fn from(p: Pattern) -> Self {
        Value::Regex(p)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
