//! Document facade
//!
//! A [`Document`] wraps a plain mapping together with the class that
//! governs it. Field access goes through one dotted-path accessor; `doc["a.b"]`
//! and [`Document::get`] are the same lookup.
//!
//! Documents hold native values. Custom type conversion happens when values
//! enter ([`Document::set`], [`Document::from_storage`]) and when they leave
//! ([`Document::to_storage`], [`Document::prepare_save`]).
//!
//! State machine:
//!
//! ```text
//! construct ──> Unvalidated ──validate ok──> Validated
//!                    ^   │                       │
//!                    │   └─collect, violations─> Invalid
//!                    └──────── any mutation ─────┘
//! ```

mod class;

pub use class::{DocumentClass, DocumentClassBuilder};

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::schema::{ConversionError, KitResult, ValidationMode, ValidationResult, Violation};
use crate::value::{map_to_json, FieldPath, Key, Map, Value};

/// Validation state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Unvalidated,
    Validated,
    /// Collect-mode validation found violations
    Invalid,
}

/// Mapping-like view of one document of a class
#[derive(Debug, Clone)]
pub struct Document {
    class: Arc<DocumentClass>,
    /// Always a [`Value::Map`]
    root: Value,
    state: DocumentState,
    violations: Vec<Violation>,
}

static NULL: Value = Value::Null;

impl Document {
    /// A document holding the class skeleton and its explicit defaults.
    pub fn new(class: &Arc<DocumentClass>) -> Self {
        Self::from_root(class, Value::Map(class.template().clone()))
    }

    /// Merges `data` over the class skeleton. Nested mappings are merged
    /// key by key; every other value replaces the default.
    pub fn with_defaults(class: &Arc<DocumentClass>, data: Map) -> Self {
        let mut root = class.template().clone();
        merge(&mut root, data);
        Self::from_root(class, Value::Map(root))
    }

    /// Wraps a stored mapping, converting custom fields to their native
    /// form. No defaults are applied.
    pub fn from_storage(class: &Arc<DocumentClass>, stored: Map) -> Result<Self, ConversionError> {
        let root = class.structure().native_form(&Value::Map(stored), "")?;
        Ok(Self::from_root(class, root))
    }

    fn from_root(class: &Arc<DocumentClass>, root: Value) -> Self {
        Self {
            class: Arc::clone(class),
            root,
            state: DocumentState::Unvalidated,
            violations: Vec::new(),
        }
    }

    pub fn class(&self) -> &Arc<DocumentClass> {
        &self.class
    }

    pub fn as_map(&self) -> &Map {
        static EMPTY: Map = Map::new();
        self.root.as_map().unwrap_or(&EMPTY)
    }

    pub fn into_map(self) -> Map {
        match self.root {
            Value::Map(map) => map,
            _ => Map::new(),
        }
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    /// Violations recorded by the last collect-mode validation.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    // =========================================================================
    // Field access
    // =========================================================================

    pub fn get(&self, path: &str) -> Option<&Value> {
        FieldPath::parse(path).lookup(&self.root)
    }

    /// Mutable access; the document becomes unvalidated.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        self.invalidate();
        FieldPath::parse(path).lookup_mut(&mut self.root)
    }

    /// Writes a field, creating intermediate mappings. Values given in the
    /// storage form of a custom field are converted to native form.
    ///
    /// Returns the previous value.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> KitResult<Option<Value>> {
        let field_path = FieldPath::parse(path);
        let mut value = value.into();
        if let Some(descriptor) = self.class.structure().resolve(&field_path.schema_path()) {
            value = descriptor.native_form(&value, path)?;
        }
        self.invalidate();
        Ok(field_path.assign(&mut self.root, value)?)
    }

    pub fn remove(&mut self, path: &str) -> Option<Value> {
        self.invalidate();
        FieldPath::parse(path).remove(&mut self.root)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    fn invalidate(&mut self) {
        self.state = DocumentState::Unvalidated;
        self.violations.clear();
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validates in the class's configured mode.
    pub fn validate(&mut self) -> ValidationResult<&[Violation]> {
        self.validate_with(self.class.config().mode)
    }

    /// Strict mode returns the first violation as an error and leaves the
    /// document unvalidated. Collect mode returns every violation and marks
    /// the document invalid when there are any.
    pub fn validate_with(&mut self, mode: ValidationMode) -> ValidationResult<&[Violation]> {
        let result = self.class.validator().run(self.as_map(), mode);
        match result {
            Ok(violations) => {
                self.state = if violations.is_empty() {
                    DocumentState::Validated
                } else {
                    DocumentState::Invalid
                };
                self.violations = violations;
                Ok(self.violations.as_slice())
            }
            Err(e) => {
                debug!(class = %self.class.name(), path = %e.path(), code = e.code(), "document rejected");
                self.invalidate();
                Err(e)
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == DocumentState::Validated
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// The document in storage form.
    pub fn to_storage(&self) -> Result<Map, ConversionError> {
        self.class.structure().storage_map(self.as_map())
    }

    /// Save boundary: validates strictly unless the class skips validation,
    /// then produces the storage form.
    pub fn prepare_save(&mut self) -> KitResult<Map> {
        if !self.class.skip_validation() {
            self.validate_with(ValidationMode::Strict)?;
        }
        Ok(self.to_storage()?)
    }

    /// JSON export of the storage form.
    pub fn to_json(&self) -> Result<JsonValue, ConversionError> {
        Ok(JsonValue::Object(map_to_json(&self.to_storage()?)))
    }
}

/// Deep-merges `overlay` into `base`.
fn merge(base: &mut Map, overlay: Map) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Map(existing)), Value::Map(nested)) => merge(existing, nested),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

impl Index<&str> for Document {
    type Output = Value;

    /// Missing fields read as null.
    fn index(&self, path: &str) -> &Value {
        self.get(path).unwrap_or(&NULL)
    }
}

impl PartialEq<Map> for Document {
    fn eq(&self, other: &Map) -> bool {
        self.as_map() == other
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.class.name() == other.class.name() && self.root == other.root
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class.name(), self.root)
    }
}

impl From<&Document> for Value {
    fn from(doc: &Document) -> Self {
        doc.root.clone()
    }
}

/// Shorthand for building a root mapping from pairs.
pub fn map_of<I, K, V>(pairs: I) -> Map
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<Key>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{decl, TypeTag, ValidationError};
    use serde_json::json;

    fn blog_post() -> Arc<DocumentClass> {
        DocumentClass::builder("BlogPost")
            .structure(decl::map([
                ("title", decl::ty(TypeTag::Text)),
                ("body", decl::ty(TypeTag::Text)),
                ("rank", decl::ty(TypeTag::Int)),
                ("author", decl::map([("name", TypeTag::Text), ("email", TypeTag::Text)])),
                ("tags", decl::custom("set_of_text")),
            ]))
            .required_fields(["title"])
            .default_value("rank", 0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_document_skeleton() {
        let doc = Document::new(&blog_post());
        assert_eq!(doc["rank"], Value::Int32(0));
        assert_eq!(doc["title"], Value::Null);
        assert_eq!(doc["author.name"], Value::Null);
        assert_eq!(doc["tags"], Value::Set(vec![]));
        assert_eq!(doc["no.such.field"], Value::Null);
        assert_eq!(doc.state(), DocumentState::Unvalidated);
    }

    #[test]
    fn test_tuple_default_is_all_null() {
        let class = DocumentClass::builder("MyDoc")
            .structure(decl::map([(
                "foo",
                decl::tuple([TypeTag::Int, TypeTag::Text, TypeTag::Float]),
            )]))
            .build()
            .unwrap();
        let doc = Document::new(&class);
        assert_eq!(doc["foo"], Value::List(vec![Value::Null; 3]));
    }

    #[test]
    fn test_with_defaults_deep_merges() {
        let data = Value::from_json(&json!({"title": "Hello", "author": {"name": "Ann"}}));
        let doc = Document::with_defaults(&blog_post(), data.as_map().unwrap().clone());
        assert_eq!(doc["title"], Value::from("Hello"));
        assert_eq!(doc["author.name"], Value::from("Ann"));
        assert_eq!(doc["author.email"], Value::Null);
        assert_eq!(doc["rank"], Value::Int32(0));
    }

    #[test]
    fn test_validate_transitions() {
        let mut doc = Document::new(&blog_post());
        let err = doc.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Structure(_)));
        assert_eq!(err.to_string(), "required fields : ['title']");
        assert_eq!(doc.state(), DocumentState::Unvalidated);

        doc.set("title", "Hello").unwrap();
        assert!(doc.validate().unwrap().is_empty());
        assert_eq!(doc.state(), DocumentState::Validated);

        doc.set("rank", 2).unwrap();
        assert_eq!(doc.state(), DocumentState::Unvalidated);

        assert!(doc.validate().is_ok());
        doc.get_mut("body");
        assert_eq!(doc.state(), DocumentState::Unvalidated);
    }

    #[test]
    fn test_collect_mode_marks_invalid() {
        let mut doc = Document::new(&blog_post());
        doc.set("rank", "first").unwrap();
        let count = doc.validate_with(ValidationMode::Collect).unwrap().len();
        assert_eq!(count, 2);
        assert_eq!(doc.state(), DocumentState::Invalid);
        assert_eq!(doc.violations()[0].path, "rank");

        doc.remove("rank");
        assert!(doc.violations().is_empty());
        assert_eq!(doc.state(), DocumentState::Unvalidated);
    }

    #[test]
    fn test_set_converts_storage_form() {
        let mut doc = Document::new(&blog_post());
        doc.set("tags", Value::List(vec!["a".into(), "b".into(), "a".into()]))
            .unwrap();
        assert_eq!(doc["tags"], Value::set(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_storage_round_trip() {
        let class = blog_post();
        let stored = map_of([
            ("title", Value::from("Hi")),
            ("tags", Value::List(vec!["x".into()])),
        ]);
        let doc = Document::from_storage(&class, stored.clone()).unwrap();
        assert_eq!(doc["tags"], Value::set(vec!["x".into()]));
        assert!(doc.get("rank").is_none());
        assert_eq!(doc.to_storage().unwrap(), stored);
    }

    #[test]
    fn test_prepare_save() {
        let mut doc = Document::new(&blog_post());
        assert!(doc.prepare_save().is_err());

        doc.set("title", "Hi").unwrap();
        doc.set("tags", Value::set(vec!["rust".into()])).unwrap();
        let stored = doc.prepare_save().unwrap();
        assert_eq!(
            stored.get(&Key::from("tags")),
            Some(&Value::List(vec!["rust".into()]))
        );
        assert_eq!(doc.state(), DocumentState::Validated);
    }

    #[test]
    fn test_skip_validation_on_save() {
        let class = DocumentClass::builder("Loose")
            .structure(decl::map([("n", TypeTag::Int)]))
            .skip_validation(true)
            .build()
            .unwrap();
        let mut doc = Document::new(&class);
        doc.set("n", "not a number").unwrap();
        assert!(doc.prepare_save().is_ok());
    }

    #[test]
    fn test_to_json() {
        let mut doc = Document::new(&blog_post());
        doc.set("title", "Hi").unwrap();
        let json = doc.to_json().unwrap();
        assert_eq!(json["title"], json!("Hi"));
        assert_eq!(json["tags"], json!([]));
        assert_eq!(json["author"], json!({"name": null, "email": null}));
    }

    #[test]
    fn test_equality_with_map() {
        let class = DocumentClass::builder("Pair")
            .structure(decl::map([("a", TypeTag::Int)]))
            .build()
            .unwrap();
        let doc = Document::with_defaults(&class, map_of([("a", 1)]));
        assert!(doc == map_of([("a", 1)]));
        assert!(doc != map_of([("a", 2)]));
    }

    #[test]
    fn test_set_through_missing_parent() {
        let class = DocumentClass::builder("Loose")
            .use_schemaless(true)
            .build()
            .unwrap();
        let mut doc = Document::new(&class);
        doc.set("a.b.c", 1).unwrap();
        assert_eq!(doc["a.b.c"], Value::Int32(1));
        assert_eq!(doc.validate().unwrap().len(), 0);
    }
}
