//! Field paths
//!
//! A single canonical path form is used for every field access. Both
//! `a.b.0` and `a.b[0]` parse to the segments `a`, `b`, `0`.

use std::fmt;

use super::{Key, Value};
use crate::schema::FieldError;

/// Parsed dotted field path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        for part in path.split('.') {
            match part.find('[') {
                Some(pos) => {
                    if pos > 0 {
                        segments.push(part[..pos].to_string());
                    }
                    for piece in part[pos..].split(']') {
                        let index = piece.trim_start_matches('[');
                        if !index.is_empty() {
                            segments.push(index.to_string());
                        }
                    }
                }
                None if !part.is_empty() => segments.push(part.to_string()),
                None => {}
            }
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path with list positions removed, as declared in a structure.
    pub fn schema_path(&self) -> String {
        self.segments
            .iter()
            .filter(|s| !is_index(s))
            .cloned()
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn lookup<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        let mut current = root;
        for segment in &self.segments {
            current = child(current, segment)?;
        }
        Some(current)
    }

    /// Looks the path up from a document root mapping.
    pub fn lookup_map<'v>(&self, root: &'v super::Map) -> Option<&'v Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = root.get(&map_key(root, first))?;
        for segment in rest {
            current = child(current, segment)?;
        }
        Some(current)
    }

    pub fn lookup_mut<'v>(&self, root: &'v mut Value) -> Option<&'v mut Value> {
        let mut current = root;
        for segment in &self.segments {
            current = child_mut(current, segment)?;
        }
        Some(current)
    }

    /// Writes `value` at this path, creating intermediate maps as needed.
    ///
    /// Returns the previous value, if any.
    pub fn assign(&self, root: &mut Value, value: Value) -> Result<Option<Value>, FieldError> {
        let (last, parents) = self.segments.split_last().ok_or(FieldError::EmptyPath)?;

        let mut current = root;
        for (depth, segment) in parents.iter().enumerate() {
            let here = self.prefix(depth + 1);
            current = match current {
                Value::Map(map) => {
                    let key = map_key(map, segment);
                    map.entry(key).or_insert_with(Value::map)
                }
                Value::List(items) => {
                    let len = items.len();
                    let index = parse_index(segment, &here)?;
                    items.get_mut(index).ok_or(FieldError::IndexOutOfRange {
                        path: here.clone(),
                        index,
                        len,
                    })?
                }
                other => {
                    return Err(FieldError::NotAContainer {
                        path: self.prefix(depth),
                        found: other.type_name().to_string(),
                    })
                }
            };
        }

        match current {
            Value::Map(map) => {
                let key = map_key(map, last);
                Ok(map.insert(key, value))
            }
            Value::List(items) => {
                let index = parse_index(last, &self.to_string())?;
                let len = items.len();
                let slot = items.get_mut(index).ok_or(FieldError::IndexOutOfRange {
                    path: self.to_string(),
                    index,
                    len,
                })?;
                Ok(Some(std::mem::replace(slot, value)))
            }
            other => Err(FieldError::NotAContainer {
                path: self.prefix(self.segments.len() - 1),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Removes the map entry at this path.
    pub fn remove(&self, root: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let parent = FieldPath {
            segments: parents.to_vec(),
        };
        let map = parent.lookup_mut(root)?.as_map_mut()?;
        let key = map_key(map, last);
        map.remove(&key)
    }

    fn prefix(&self, len: usize) -> String {
        self.segments[..len].join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn parse_index(segment: &str, path: &str) -> Result<usize, FieldError> {
    segment.parse().map_err(|_| FieldError::InvalidIndex {
        path: path.to_string(),
        segment: segment.to_string(),
    })
}

/// Resolves a segment against an existing map: text key first, then an
/// integer key if one is present.
fn map_key(map: &super::Map, segment: &str) -> Key {
    let text = Key::Text(segment.to_string());
    if map.contains_key(&text) {
        return text;
    }
    match segment.parse::<i64>() {
        Ok(n) if map.contains_key(&Key::Int(n)) => Key::Int(n),
        _ => text,
    }
}

fn child<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Map(map) => map.get(&map_key(map, segment)),
        Value::List(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn child_mut<'v>(value: &'v mut Value, segment: &str) -> Option<&'v mut Value> {
    match value {
        Value::Map(map) => {
            let key = map_key(map, segment);
            map.get_mut(&key)
        }
        Value::List(items) => items.get_mut(segment.parse::<usize>().ok()?),
        _ => None,
    }
}
