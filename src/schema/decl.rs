//! Structure declarations
//!
//! A declaration is plain data describing the expected shape of a document.
//! It is parsed once, when a class is built, into a [`Descriptor`] tree.
//!
//! JSON form (used by class definition files):
//!
//! ```text
//! null                         any authorized value
//! "int", "text", ...           primitive type
//! {} or "map"                  raw mapping
//! {"a": <decl>, ...}           nested structure
//! {"$map": [<key>, <value>]}   typed raw mapping
//! [] or "list"                 untyped list
//! [<decl>]                     typed list
//! {"$tuple": [<decl>, ...]}    fixed-arity tuple
//! {"$or": [...]}               any alternative matches
//! {"$not": [...]}              no exclusion matches
//! {"$is": [<literal>, ...]}    one of the literals
//! {"$custom": "<name>"}        registered custom type
//! ```
//!
//! [`Descriptor`]: super::Descriptor

use serde_json::Value as JsonValue;

use super::types::TypeTag;
use crate::value::Value;

/// Literal structure declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Any,
    Type(TypeTag),
    Map(Vec<(String, Decl)>),
    TypedMap(Box<Decl>, Box<Decl>),
    List(Option<Box<Decl>>),
    Tuple(Vec<Decl>),
    Or(Vec<Decl>),
    Not(Vec<Decl>),
    Is(Vec<Value>),
    Custom(String),
}

impl From<TypeTag> for Decl {
    fn from(tag: TypeTag) -> Self {
        Decl::Type(tag)
    }
}

pub fn any() -> Decl {
    Decl::Any
}

pub fn ty(tag: TypeTag) -> Decl {
    Decl::Type(tag)
}

/// Nested structure with fixed keys.
pub fn map<I, K, D>(fields: I) -> Decl
where
    I: IntoIterator<Item = (K, D)>,
    K: Into<String>,
    D: Into<Decl>,
{
    Decl::Map(
        fields
            .into_iter()
            .map(|(k, d)| (k.into(), d.into()))
            .collect(),
    )
}

/// Mapping with arbitrary, unvalidated content.
pub fn raw_map() -> Decl {
    Decl::Map(Vec::new())
}

/// Mapping whose keys and values each satisfy a declaration.
pub fn typed_map(key: impl Into<Decl>, value: impl Into<Decl>) -> Decl {
    Decl::TypedMap(Box::new(key.into()), Box::new(value.into()))
}

/// Sequence whose every element satisfies `element`.
pub fn list(element: impl Into<Decl>) -> Decl {
    Decl::List(Some(Box::new(element.into())))
}

pub fn untyped_list() -> Decl {
    Decl::List(None)
}

pub fn tuple<I, D>(elements: I) -> Decl
where
    I: IntoIterator<Item = D>,
    D: Into<Decl>,
{
    Decl::Tuple(elements.into_iter().map(Into::into).collect())
}

pub fn or<I, D>(alternatives: I) -> Decl
where
    I: IntoIterator<Item = D>,
    D: Into<Decl>,
{
    Decl::Or(alternatives.into_iter().map(Into::into).collect())
}

pub fn not<I, D>(exclusions: I) -> Decl
where
    I: IntoIterator<Item = D>,
    D: Into<Decl>,
{
    Decl::Not(exclusions.into_iter().map(Into::into).collect())
}

pub fn is<I, V>(allowed: I) -> Decl
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Decl::Is(allowed.into_iter().map(Into::into).collect())
}

pub fn custom(name: impl Into<String>) -> Decl {
    Decl::Custom(name.into())
}

impl Decl {
    /// Parses the JSON declaration form.
    pub fn from_json(json: &JsonValue) -> Result<Decl, String> {
        match json {
            JsonValue::Null => Ok(Decl::Any),
            JsonValue::String(name) => TypeTag::from_name(name)
                .map(Decl::Type)
                .ok_or_else(|| format!("unknown type name '{}'", name)),
            JsonValue::Array(items) => match items.as_slice() {
                [] => Ok(Decl::List(None)),
                [element] => Ok(list(Decl::from_json(element)?)),
                _ => Err(format!(
                    "list declaration {} has {} elements; use $tuple or $or",
                    json,
                    items.len()
                )),
            },
            JsonValue::Object(obj) => {
                if let Some((op, operand)) = obj.iter().find(|(k, _)| k.starts_with('$')) {
                    if obj.len() != 1 {
                        return Err(format!("operator {} must be the only key", op));
                    }
                    return Self::operator_from_json(op, operand);
                }
                let fields = obj
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Decl::from_json(v)?)))
                    .collect::<Result<Vec<_>, String>>()?;
                Ok(Decl::Map(fields))
            }
            other => Err(format!("{} must be a string or a type", other)),
        }
    }

    fn operator_from_json(op: &str, operand: &JsonValue) -> Result<Decl, String> {
        let operands = || {
            operand
                .as_array()
                .ok_or_else(|| format!("{} expects an array", op))
        };
        match op {
            "$map" => match operands()?.as_slice() {
                [key, value] => Ok(typed_map(Decl::from_json(key)?, Decl::from_json(value)?)),
                _ => Err("$map expects [key, value]".to_string()),
            },
            "$tuple" => Ok(Decl::Tuple(Self::all_from_json(operands()?)?)),
            "$or" => Ok(Decl::Or(Self::all_from_json(operands()?)?)),
            "$not" => Ok(Decl::Not(Self::all_from_json(operands()?)?)),
            "$is" => Ok(Decl::Is(operands()?.iter().map(Value::from_json).collect())),
            "$custom" => operand
                .as_str()
                .map(custom)
                .ok_or_else(|| "$custom expects a type name".to_string()),
            other => Err(format!("unknown operator '{}'", other)),
        }
    }

    fn all_from_json(items: &[JsonValue]) -> Result<Vec<Decl>, String> {
        items.iter().map(Decl::from_json).collect()
    }
}
