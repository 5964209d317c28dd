//! Custom type registry
//!
//! A custom type converts between an in-memory (native) value and the form
//! the store persists. Converters are stateless: one instance serves every
//! field and every document that declares it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::errors::{ConversionError, DefinitionError};
use super::types::TypeTag;
use crate::value::Value;

/// Bidirectional converter between native and storage representations.
pub trait CustomType: Send + Sync + fmt::Debug {
    /// Registry key, referenced from declarations.
    fn name(&self) -> &str;

    /// Tag the converted value must carry once in storage form.
    fn storage_type(&self) -> TypeTag;

    /// Tag of the native form, when it is distinguishable.
    fn native_type(&self) -> Option<TypeTag> {
        None
    }

    fn to_storage(&self, value: &Value) -> Result<Value, ConversionError>;

    fn to_native(&self, value: &Value) -> Result<Value, ConversionError>;

    /// Checks a native value held at `path`. Errors without a path are
    /// qualified with it by the caller.
    fn validate(&self, _value: &Value, _path: &str) -> Result<(), ConversionError> {
        Ok(())
    }

    /// Value for a freshly constructed document.
    fn initial_value(&self) -> Value {
        Value::Null
    }
}

/// Lookup table of custom types keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CustomTypeRegistry {
    types: HashMap<String, Arc<dyn CustomType>>,
}

impl CustomTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a `set_of_<tag>` type for every primitive tag.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tag in TypeTag::ALL.iter().filter(|t| t.is_primitive()) {
            registry.types.insert(
                SetOf::default_name(*tag),
                Arc::new(SetOf::new(*tag)),
            );
        }
        registry
    }

    pub fn register<T: CustomType + 'static>(&mut self, custom: T) -> Result<(), DefinitionError> {
        self.register_arc(Arc::new(custom))
    }

    /// Registers a converter. Names are unique.
    pub fn register_arc(&mut self, custom: Arc<dyn CustomType>) -> Result<(), DefinitionError> {
        let name = custom.name().to_string();
        if self.types.contains_key(&name) {
            return Err(DefinitionError::new(
                "custom types",
                format!("custom type '{}' is already registered", name),
            ));
        }
        self.types.insert(name, custom);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomType>> {
        self.types.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

/// Set of primitive values, stored as a list.
#[derive(Debug, Clone)]
pub struct SetOf {
    name: String,
    element: TypeTag,
}

impl SetOf {
    pub fn new(element: TypeTag) -> Self {
        Self::named(Self::default_name(element), element)
    }

    pub fn named(name: impl Into<String>, element: TypeTag) -> Self {
        Self {
            name: name.into(),
            element,
        }
    }

    pub fn default_name(element: TypeTag) -> String {
        format!("set_of_{}", element.name())
    }
}

impl CustomType for SetOf {
    fn name(&self) -> &str {
        &self.name
    }

    fn storage_type(&self) -> TypeTag {
        TypeTag::List
    }

    fn native_type(&self) -> Option<TypeTag> {
        Some(TypeTag::Set)
    }

    fn to_storage(&self, value: &Value) -> Result<Value, ConversionError> {
        match value {
            Value::Set(items) => Ok(Value::List(items.clone())),
            other => Err(ConversionError::new(format!(
                "expected a set, found {}",
                other.type_name()
            ))),
        }
    }

    fn to_native(&self, value: &Value) -> Result<Value, ConversionError> {
        match value {
            Value::List(items) => Ok(Value::set(items.iter().cloned())),
            other => Err(ConversionError::new(format!(
                "expected a list, found {}",
                other.type_name()
            ))),
        }
    }

    fn validate(&self, value: &Value, _path: &str) -> Result<(), ConversionError> {
        let Value::Set(items) = value else {
            return Ok(());
        };
        match items.iter().find(|item| !self.element.accepts(item)) {
            Some(bad) => Err(ConversionError::new(format!(
                "set members must be {} not {}",
                self.element,
                bad.type_name()
            ))),
            None => Ok(()),
        }
    }

    fn initial_value(&self) -> Value {
        Value::Set(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_cover_primitives() {
        let registry = CustomTypeRegistry::with_builtins();
        assert_eq!(registry.len(), 10);
        assert!(registry.contains("set_of_int"));
        assert!(registry.contains("set_of_text"));
        assert!(!registry.contains("set_of_list"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = CustomTypeRegistry::new();
        registry.register(SetOf::new(TypeTag::Int)).unwrap();
        let err = registry.register(SetOf::new(TypeTag::Int)).unwrap_err();
        assert!(err.message.contains("already registered"));
    }

    #[test]
    fn test_set_conversion() {
        let set_of = SetOf::new(TypeTag::Int);
        let native = Value::set(vec![1.into(), 2.into()]);
        let stored = set_of.to_storage(&native).unwrap();
        assert_eq!(stored, Value::List(vec![1.into(), 2.into()]));
        assert_eq!(set_of.to_native(&stored).unwrap(), native);
    }

    #[test]
    fn test_to_native_deduplicates() {
        let set_of = SetOf::new(TypeTag::Int);
        let stored = Value::List(vec![1.into(), 1.into(), 2.into()]);
        assert_eq!(
            set_of.to_native(&stored).unwrap(),
            Value::set(vec![1.into(), 2.into()])
        );
    }

    #[test]
    fn test_set_validation() {
        let set_of = SetOf::new(TypeTag::Int);
        assert!(set_of.validate(&Value::set(vec![1.into()]), "tags").is_ok());
        let err = set_of
            .validate(&Value::set(vec!["1".into(), "2".into()]), "tags")
            .unwrap_err();
        assert_eq!(err.message, "set members must be int not text");
    }
}
