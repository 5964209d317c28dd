//! Descriptor tree
//!
//! Canonical form of a declaration. Built once per class and never mutated;
//! every document of the class validates against the same tree.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::custom::{CustomType, CustomTypeRegistry};
use super::decl::Decl;
use super::errors::{ConversionError, DefinitionError};
use super::types::{AuthorizedTypes, TypeTag};
use crate::value::{Key, Map, Value};

/// Expected shape at one path
#[derive(Debug, Clone)]
pub enum Descriptor {
    /// Any authorized value
    Untyped,
    Primitive(TypeTag),
    /// Fixed keys, each with its own descriptor
    Mapping(BTreeMap<String, Descriptor>),
    /// Arbitrary keys and values, unvalidated
    RawMapping,
    TypedRawMapping {
        key: TypeTag,
        value: Box<Descriptor>,
    },
    List(Option<Box<Descriptor>>),
    Tuple(Vec<Descriptor>),
    Or(Vec<Descriptor>),
    Not(Vec<Descriptor>),
    Enum(Vec<Value>),
    Custom(Arc<dyn CustomType>),
}

static UNTYPED: Descriptor = Descriptor::Untyped;

/// Inputs needed to turn declarations into descriptors
pub struct ParseContext<'a> {
    pub class: &'a str,
    pub authorized: &'a AuthorizedTypes,
    pub registry: &'a CustomTypeRegistry,
}

impl ParseContext<'_> {
    fn error(&self, message: impl Into<String>) -> DefinitionError {
        DefinitionError::new(self.class, message)
    }
}

impl Descriptor {
    /// Parses a declaration. Every malformation is reported here, never
    /// deferred to validation.
    pub fn parse(decl: &Decl, ctx: &ParseContext<'_>) -> Result<Descriptor, DefinitionError> {
        match decl {
            Decl::Any => Ok(Descriptor::Untyped),
            Decl::Type(tag) => {
                if !ctx.authorized.contains(*tag) {
                    return Err(ctx.error(format!("{} is not an authorized type", tag)));
                }
                Ok(match tag {
                    TypeTag::Map => Descriptor::RawMapping,
                    TypeTag::List => Descriptor::List(None),
                    other => Descriptor::Primitive(*other),
                })
            }
            Decl::Map(fields) if fields.is_empty() => Ok(Descriptor::RawMapping),
            Decl::Map(fields) => Ok(Descriptor::Mapping(Self::parse_fields(fields, ctx)?)),
            Decl::TypedMap(key, value) => {
                let key = match key.as_ref() {
                    Decl::Type(tag @ (TypeTag::Text | TypeTag::Int)) => *tag,
                    Decl::Type(tag) if !ctx.authorized.contains(*tag) => {
                        return Err(ctx.error(format!("{} is not an authorized type", tag)))
                    }
                    other => {
                        return Err(ctx.error(format!(
                            "{} must be a string or a type",
                            Self::render_decl(other, ctx)
                        )))
                    }
                };
                Ok(Descriptor::TypedRawMapping {
                    key,
                    value: Box::new(Self::parse(value, ctx)?),
                })
            }
            Decl::List(None) => Ok(Descriptor::List(None)),
            Decl::List(Some(element)) => {
                Ok(Descriptor::List(Some(Box::new(Self::parse(element, ctx)?))))
            }
            Decl::Tuple(elements) => {
                if elements.is_empty() {
                    return Err(ctx.error("tuple must declare at least one element"));
                }
                let parsed = elements
                    .iter()
                    .map(|e| Self::parse(e, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Descriptor::Tuple(parsed))
            }
            Decl::Or(operands) => {
                let parsed = Self::parse_operands("or", operands, ctx)?;
                Self::check_operands(Descriptor::Or(parsed), ctx)
            }
            Decl::Not(operands) => {
                let parsed = Self::parse_operands("not", operands, ctx)?;
                Self::check_operands(Descriptor::Not(parsed), ctx)
            }
            Decl::Is(literals) => {
                if literals.is_empty() {
                    return Err(ctx.error("is requires at least one literal"));
                }
                let descriptor = Descriptor::Enum(literals.clone());
                for literal in literals {
                    let scalar = literal.tag().map_or(true, |t| t.is_primitive());
                    if !scalar || !ctx.authorized.allows(literal) {
                        return Err(ctx.error(format!(
                            "{} in {} is not an authorized type ({} found)",
                            literal,
                            descriptor,
                            literal.type_name()
                        )));
                    }
                }
                Ok(descriptor)
            }
            Decl::Custom(name) => ctx
                .registry
                .get(name)
                .map(Descriptor::Custom)
                .ok_or_else(|| ctx.error(format!("custom type '{}' is not registered", name))),
        }
    }

    /// Parses the fields of a nested structure.
    pub fn parse_fields(
        fields: &[(String, Decl)],
        ctx: &ParseContext<'_>,
    ) -> Result<BTreeMap<String, Descriptor>, DefinitionError> {
        let mut parsed = BTreeMap::new();
        for (name, decl) in fields {
            if name.is_empty() || name.contains('.') {
                return Err(ctx.error(format!("invalid field name '{}'", name)));
            }
            if parsed.insert(name.clone(), Self::parse(decl, ctx)?).is_some() {
                return Err(ctx.error(format!("duplicate field '{}'", name)));
            }
        }
        Ok(parsed)
    }

    /// Operands are parsed without the authorization check so that an
    /// unauthorized operand can be reported against the whole combinator.
    fn parse_operands(
        op: &str,
        operands: &[Decl],
        ctx: &ParseContext<'_>,
    ) -> Result<Vec<Descriptor>, DefinitionError> {
        if operands.is_empty() {
            return Err(ctx.error(format!("{} requires at least one operand", op)));
        }
        let mut parsed: Vec<Descriptor> = Vec::with_capacity(operands.len());
        for operand in operands {
            let descriptor = match operand {
                Decl::Type(TypeTag::Map) => Descriptor::RawMapping,
                Decl::Type(TypeTag::List) => Descriptor::List(None),
                Decl::Type(tag) => Descriptor::Primitive(*tag),
                other => Self::parse(other, ctx)?,
            };
            if !parsed.contains(&descriptor) {
                parsed.push(descriptor);
            }
        }
        Ok(parsed)
    }

    fn check_operands(
        descriptor: Descriptor,
        ctx: &ParseContext<'_>,
    ) -> Result<Descriptor, DefinitionError> {
        if let Descriptor::Or(operands) | Descriptor::Not(operands) = &descriptor {
            for operand in operands {
                if let Descriptor::Primitive(tag) = operand {
                    if !ctx.authorized.contains(*tag) {
                        return Err(ctx.error(format!(
                            "{} in {} is not an authorized type",
                            tag, descriptor
                        )));
                    }
                }
            }
        }
        Ok(descriptor)
    }

    fn render_decl(decl: &Decl, ctx: &ParseContext<'_>) -> String {
        let lenient = AuthorizedTypes::default().with(TypeTag::Set);
        let render_ctx = ParseContext {
            class: ctx.class,
            authorized: &lenient,
            registry: ctx.registry,
        };
        Self::parse(decl, &render_ctx).map_or_else(|_| format!("{:?}", decl), |d| d.to_string())
    }

    /// Value materialized for an unset field.
    pub fn default_value(&self) -> Value {
        match self {
            Descriptor::Mapping(fields) => Value::Map(
                fields
                    .iter()
                    .map(|(name, d)| (Key::Text(name.clone()), d.default_value()))
                    .collect(),
            ),
            Descriptor::RawMapping | Descriptor::TypedRawMapping { .. } => Value::map(),
            Descriptor::List(_) => Value::List(Vec::new()),
            Descriptor::Tuple(elements) => Value::List(vec![Value::Null; elements.len()]),
            Descriptor::Custom(custom) => custom.initial_value(),
            _ => Value::Null,
        }
    }

    /// Looks up the descriptor for a dotted schema path.
    ///
    /// Typed lists are transparent. Paths reaching beneath a raw mapping
    /// or an untyped field resolve to [`Descriptor::Untyped`].
    pub fn resolve(&self, path: &str) -> Option<&Descriptor> {
        let mut current = self;
        for segment in path.split('.') {
            while let Descriptor::List(Some(element)) = current {
                current = element;
            }
            current = match current {
                Descriptor::Mapping(fields) => fields.get(segment)?,
                Descriptor::TypedRawMapping { value, .. } => value,
                Descriptor::RawMapping | Descriptor::Untyped => return Some(&UNTYPED),
                _ => return None,
            };
        }
        Some(current)
    }

    /// Converts a native value into its storage form.
    pub fn storage_form(&self, value: &Value, path: &str) -> Result<Value, ConversionError> {
        self.convert(value, path, Direction::Storage)
    }

    /// Converts a stored value into its native form.
    pub fn native_form(&self, value: &Value, path: &str) -> Result<Value, ConversionError> {
        self.convert(value, path, Direction::Native)
    }

    /// Converts the fields of a document mapping.
    pub fn storage_map(&self, map: &Map) -> Result<Map, ConversionError> {
        match self.storage_form(&Value::Map(map.clone()), "")? {
            Value::Map(converted) => Ok(converted),
            _ => Ok(map.clone()),
        }
    }

    fn convert(&self, value: &Value, path: &str, direction: Direction) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match (self, value) {
            (Descriptor::Custom(custom), _) => convert_custom(custom.as_ref(), value, path, direction),
            (Descriptor::Mapping(fields), Value::Map(map)) => {
                let mut converted = Map::new();
                for (key, item) in map {
                    let field = key.as_str().and_then(|name| fields.get(name));
                    let item = match field {
                        Some(descriptor) => {
                            descriptor.convert(item, &child_path(path, &key.to_string()), direction)?
                        }
                        None => item.clone(),
                    };
                    converted.insert(key.clone(), item);
                }
                Ok(Value::Map(converted))
            }
            (Descriptor::TypedRawMapping { key: key_tag, value: descriptor }, Value::Map(map)) => {
                let mut converted = Map::new();
                for (key, item) in map {
                    let item = descriptor.convert(item, &child_path(path, &key.to_string()), direction)?;
                    converted.insert(native_key(key, *key_tag, direction), item);
                }
                Ok(Value::Map(converted))
            }
            (Descriptor::List(Some(element)), Value::List(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| element.convert(item, &index_path(path, i), direction))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (Descriptor::Tuple(elements), Value::List(items)) if elements.len() == items.len() => elements
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (element, item))| element.convert(item, &index_path(path, i), direction))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            _ => Ok(value.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Storage,
    Native,
}

/// Text keys holding an integer become integer keys when an int-keyed map is
/// read back from a text-keyed source such as JSON.
fn native_key(key: &Key, key_tag: TypeTag, direction: Direction) -> Key {
    match (direction, key_tag, key) {
        (Direction::Native, TypeTag::Int, Key::Text(text)) => match text.parse::<i64>() {
            Ok(n) => Key::Int(n),
            Err(_) => key.clone(),
        },
        _ => key.clone(),
    }
}

/// Values not in the source form are passed through untouched; validation
/// reports them.
fn convert_custom(
    custom: &dyn CustomType,
    value: &Value,
    path: &str,
    direction: Direction,
) -> Result<Value, ConversionError> {
    let result = match direction {
        Direction::Storage => {
            let is_native = custom
                .native_type()
                .map_or(value.tag() != Some(custom.storage_type()), |t| value.tag() == Some(t));
            if !is_native {
                return Ok(value.clone());
            }
            custom.to_storage(value)
        }
        Direction::Native => {
            if value.tag() != Some(custom.storage_type()) {
                return Ok(value.clone());
            }
            custom.to_native(value)
        }
    };
    tracing::trace!(custom_type = custom.name(), path, ?direction, "converted custom value");
    result.map_err(|e| e.at(path))
}

pub(crate) fn child_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", parent, field)
    }
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        use Descriptor::*;
        match (self, other) {
            (Untyped, Untyped) | (RawMapping, RawMapping) => true,
            (Primitive(a), Primitive(b)) => a == b,
            (Mapping(a), Mapping(b)) => a == b,
            (TypedRawMapping { key: ka, value: va }, TypedRawMapping { key: kb, value: vb }) => {
                ka == kb && va == vb
            }
            (List(a), List(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (Or(a), Or(b)) | (Not(a), Not(b)) => same_operands(a, b),
            (Enum(a), Enum(b)) => a == b,
            (Custom(a), Custom(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

/// Operand sets compare without regard to order.
fn same_operands(a: &[Descriptor], b: &[Descriptor]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Untyped => write!(f, "any"),
            Descriptor::Primitive(tag) => write!(f, "{}", tag),
            Descriptor::Mapping(fields) => {
                write!(f, "{{")?;
                for (i, (name, d)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, d)?;
                }
                write!(f, "}}")
            }
            Descriptor::RawMapping => write!(f, "map"),
            Descriptor::TypedRawMapping { key, value } => write!(f, "{{{}: {}}}", key, value),
            Descriptor::List(None) => write!(f, "list"),
            Descriptor::List(Some(element)) => write!(f, "[{}]", element),
            Descriptor::Tuple(elements) => {
                let parts: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
            Descriptor::Or(operands) => {
                let parts: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
                write!(f, "<{}>", parts.join(" or "))
            }
            Descriptor::Not(operands) => {
                let parts: Vec<String> = operands.iter().map(|o| format!("not {}", o)).collect();
                write!(f, "<{}>", parts.join(", "))
            }
            Descriptor::Enum(literals) => {
                let parts: Vec<String> = literals.iter().map(|l| format!("is {}", l)).collect();
                write!(f, "<{}>", parts.join(" or "))
            }
            Descriptor::Custom(custom) => write!(f, "{}", custom.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::custom::SetOf;
    use crate::schema::decl::{self, Decl};

    fn parse_with(decl: &Decl, authorized: &AuthorizedTypes) -> Result<Descriptor, DefinitionError> {
        let registry = CustomTypeRegistry::with_builtins();
        let ctx = ParseContext {
            class: "MyDoc",
            authorized,
            registry: &registry,
        };
        Descriptor::parse(decl, &ctx)
    }

    fn parse(decl: &Decl) -> Result<Descriptor, DefinitionError> {
        parse_with(decl, &AuthorizedTypes::default())
    }

    #[test]
    fn test_parse_primitive_and_containers() {
        assert_eq!(parse(&decl::any()).unwrap(), Descriptor::Untyped);
        assert_eq!(
            parse(&decl::ty(TypeTag::Int)).unwrap(),
            Descriptor::Primitive(TypeTag::Int)
        );
        assert_eq!(parse(&decl::raw_map()).unwrap(), Descriptor::RawMapping);
        assert_eq!(parse(&decl::ty(TypeTag::Map)).unwrap(), Descriptor::RawMapping);
        assert_eq!(parse(&decl::ty(TypeTag::List)).unwrap(), Descriptor::List(None));
        assert_eq!(
            parse(&decl::typed_map(TypeTag::Text, TypeTag::Int)).unwrap(),
            Descriptor::TypedRawMapping {
                key: TypeTag::Text,
                value: Box::new(Descriptor::Primitive(TypeTag::Int)),
            }
        );
    }

    #[test]
    fn test_unauthorized_type_rejected() {
        let err = parse(&decl::map([("foo", decl::list(TypeTag::Set))])).unwrap_err();
        assert_eq!(err.to_string(), "MyDoc: set is not an authorized type");

        let err = parse(&decl::map([(
            "foo",
            decl::list(decl::typed_map(TypeTag::Int, TypeTag::Set)),
        )]))
        .unwrap_err();
        assert_eq!(err.to_string(), "MyDoc: set is not an authorized type");
    }

    #[test]
    fn test_extended_authorization_accepts_set() {
        let authorized = AuthorizedTypes::default().with(TypeTag::Set);
        assert_eq!(
            parse_with(&decl::ty(TypeTag::Set), &authorized).unwrap(),
            Descriptor::Primitive(TypeTag::Set)
        );
    }

    #[test]
    fn test_typed_map_key_must_be_scalar_type() {
        let err = parse(&decl::typed_map(decl::list(TypeTag::Int), TypeTag::Int)).unwrap_err();
        assert_eq!(err.to_string(), "MyDoc: [int] must be a string or a type");
        let err = parse(&decl::typed_map(TypeTag::Set, TypeTag::Int)).unwrap_err();
        assert_eq!(err.to_string(), "MyDoc: set is not an authorized type");
    }

    #[test]
    fn test_combinator_rendering() {
        let d = parse(&decl::or([TypeTag::Int, TypeTag::Text])).unwrap();
        assert_eq!(d.to_string(), "<int or text>");
        let d = parse(&decl::not([TypeTag::Text, TypeTag::Int])).unwrap();
        assert_eq!(d.to_string(), "<not text, not int>");
        let d = parse(&decl::is([Value::from("3"), Value::from(3)])).unwrap();
        assert_eq!(d.to_string(), "<is '3' or is 3>");
    }

    #[test]
    fn test_combinator_unauthorized_operand() {
        let err = parse(&decl::or([TypeTag::Int, TypeTag::Set])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "MyDoc: set in <int or set> is not an authorized type"
        );
        let err = parse(&decl::not([TypeTag::Int, TypeTag::Set])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "MyDoc: set in <not int, not set> is not an authorized type"
        );
    }

    #[test]
    fn test_is_rejects_container_literal() {
        let err = parse(&decl::is([Value::List(vec!["bla".into()]), Value::from(3)])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "MyDoc: ['bla'] in <is ['bla'] or is 3> is not an authorized type (list found)"
        );
    }

    #[test]
    fn test_empty_operands_rejected() {
        assert!(parse(&Decl::Or(vec![])).is_err());
        assert!(parse(&Decl::Not(vec![])).is_err());
        assert!(parse(&Decl::Is(vec![])).is_err());
        assert!(parse(&Decl::Tuple(vec![])).is_err());
    }

    #[test]
    fn test_unregistered_custom_type() {
        let err = parse(&decl::custom("money")).unwrap_err();
        assert!(err.message.contains("'money' is not registered"));
        assert!(parse(&decl::custom("set_of_int")).is_ok());
    }

    #[test]
    fn test_bad_field_names() {
        assert!(parse(&decl::map([("a.b", TypeTag::Int)])).is_err());
        assert!(parse(&decl::map([("", TypeTag::Int)])).is_err());
        assert!(parse(&decl::map([("a", TypeTag::Int), ("a", TypeTag::Text)])).is_err());
    }

    #[test]
    fn test_operand_sets_compare_unordered() {
        let a = parse(&decl::or([TypeTag::Int, TypeTag::Text])).unwrap();
        let b = parse(&decl::or([TypeTag::Text, TypeTag::Int, TypeTag::Text])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, parse(&decl::not([TypeTag::Int, TypeTag::Text])).unwrap());
    }

    #[test]
    fn test_default_values() {
        let d = parse(&decl::map([
            ("t", decl::tuple([TypeTag::Int, TypeTag::Text, TypeTag::Float])),
            ("l", decl::list(TypeTag::Int)),
            ("m", decl::map([("x", TypeTag::Int)])),
            ("s", decl::custom("set_of_int")),
            ("o", decl::or([TypeTag::Int, TypeTag::Text])),
        ]))
        .unwrap();
        let value = d.default_value();
        assert_eq!(
            value.get_path("t"),
            Some(&Value::List(vec![Value::Null, Value::Null, Value::Null]))
        );
        assert_eq!(value.get_path("l"), Some(&Value::List(vec![])));
        assert_eq!(value.get_path("m.x"), Some(&Value::Null));
        assert_eq!(value.get_path("s"), Some(&Value::Set(vec![])));
        assert_eq!(value.get_path("o"), Some(&Value::Null));
    }

    #[test]
    fn test_resolve() {
        let d = parse(&decl::map([
            ("a", decl::map([("b", TypeTag::Int)])),
            ("raw", decl::raw_map()),
        ]))
        .unwrap();
        assert_eq!(d.resolve("a.b"), Some(&Descriptor::Primitive(TypeTag::Int)));
        assert_eq!(d.resolve("raw.anything"), Some(&Descriptor::Untyped));
        assert_eq!(d.resolve("a.c"), None);

        let d = parse(&decl::map([(
            "items",
            decl::list(decl::map([("name", TypeTag::Text)])),
        )]))
        .unwrap();
        assert_eq!(d.resolve("items.name"), Some(&Descriptor::Primitive(TypeTag::Text)));
    }

    #[test]
    fn test_storage_and_native_forms() {
        let d = parse(&decl::map([("tags", decl::custom("set_of_int"))])).unwrap();
        let mut native = Map::new();
        native.insert(Key::from("tags"), Value::set(vec![1.into(), 2.into()]));

        let stored = d.storage_map(&native).unwrap();
        assert_eq!(
            stored.get(&Key::from("tags")),
            Some(&Value::List(vec![1.into(), 2.into()]))
        );

        let back = d.native_form(&Value::Map(stored), "").unwrap();
        assert_eq!(back, Value::Map(native));
    }

    #[test]
    fn test_native_form_restores_int_keys() {
        let d = parse(&decl::map([("scores", decl::typed_map(TypeTag::Int, TypeTag::Int))])).unwrap();
        let mut scores = Map::new();
        scores.insert(Key::from("1"), Value::Int32(5));
        scores.insert(Key::from("x"), Value::Int32(6));
        let mut stored = Map::new();
        stored.insert(Key::from("scores"), Value::Map(scores));

        let native = d.native_form(&Value::Map(stored.clone()), "").unwrap();
        let scores = native.get_path("scores").and_then(Value::as_map).unwrap();
        assert_eq!(scores.get(&Key::Int(1)), Some(&Value::Int32(5)));
        assert_eq!(scores.get(&Key::from("x")), Some(&Value::Int32(6)));

        // storage direction leaves keys alone
        let same = d.storage_form(&Value::Map(stored.clone()), "").unwrap();
        assert_eq!(same, Value::Map(stored));
    }

    #[test]
    fn test_custom_equality_by_name() {
        let a = Descriptor::Custom(Arc::new(SetOf::new(TypeTag::Int)));
        let b = Descriptor::Custom(Arc::new(SetOf::new(TypeTag::Int)));
        assert_eq!(a, b);
    }
}
