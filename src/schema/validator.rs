//! Structure validator
//!
//! Walks a descriptor tree and a value in lock-step, depth first, pre-order.
//!
//! Validation semantics:
//! - Mappings: declared fields present, no undeclared fields, except
//!   beneath a typed raw mapping where only value types are checked
//! - Lists: every element satisfies the element descriptor
//! - Tuples: exact arity, checked before any element
//! - Or / Not / Is: any / none / literal equality
//! - Custom types: storage tag match, then the type's own hook
//! - Untyped values: only authorized types, recursively
//! - Null satisfies every descriptor; requiredness is a field policy
//!
//! Strict mode aborts on the first violation. Collect mode visits the whole
//! tree and returns every violation in traversal order.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::custom::CustomType;
use super::descriptor::{child_path, index_path, Descriptor};
use super::errors::{ValidationError, ValidationResult, Violation, ViolationKind};
use super::types::{AuthorizedTypes, TypeTag};
use crate::value::{document_size, FieldPath, Key, Map, Value};

/// Largest encoded document the store accepts (16 MiB)
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// How violations surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Raise the first violation
    #[default]
    Strict,
    /// Return every violation
    Collect,
}

/// Validation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    pub mode: ValidationMode,
    /// Ceiling on the encoded size of a document, in bytes.
    pub max_document_size: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Strict,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
        }
    }
}

impl ValidationConfig {
    /// Config that collects every violation.
    pub fn collect() -> Self {
        Self {
            mode: ValidationMode::Collect,
            ..Self::default()
        }
    }

    pub fn with_max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size = bytes;
        self
    }
}

/// Which fields must be present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPolicy {
    /// Only `required_fields` are enforced; presence and unknown-field
    /// checks are skipped.
    pub use_schemaless: bool,
    /// Dotted paths that must be present and non-null.
    pub required_fields: Vec<String>,
    /// Dotted schema paths that may be absent.
    pub optional_fields: Vec<String>,
}

/// Validates a value against a descriptor with default field policy.
///
/// Strict mode returns the first violation as an error; collect mode
/// returns every violation.
pub fn validate(
    descriptor: &Descriptor,
    value: &Value,
    mode: ValidationMode,
    authorized: &AuthorizedTypes,
) -> ValidationResult<Vec<Violation>> {
    let policy = FieldPolicy::default();
    let mut walker = Walker::new(mode, authorized, &policy);
    walker.walk(descriptor, value, "")?;
    Ok(walker.violations)
}

/// Validator for whole documents of one class.
///
/// Validation does not mutate the document or the structure.
pub struct StructureValidator<'a> {
    structure: &'a BTreeMap<String, Descriptor>,
    root: &'a Descriptor,
    authorized: &'a AuthorizedTypes,
    policy: &'a FieldPolicy,
    config: &'a ValidationConfig,
}

impl<'a> StructureValidator<'a> {
    /// `root` must be a [`Descriptor::Mapping`]; anything else validates
    /// as a mapping with no declared fields.
    pub fn new(
        root: &'a Descriptor,
        authorized: &'a AuthorizedTypes,
        policy: &'a FieldPolicy,
        config: &'a ValidationConfig,
    ) -> Self {
        static NO_FIELDS: BTreeMap<String, Descriptor> = BTreeMap::new();
        let structure = match root {
            Descriptor::Mapping(fields) => fields,
            _ => &NO_FIELDS,
        };
        Self {
            structure,
            root,
            authorized,
            policy,
            config,
        }
    }

    /// Validates in the configured mode.
    pub fn validate_document(&self, document: &Map) -> ValidationResult<Vec<Violation>> {
        self.run(document, self.config.mode)
    }

    /// Validates, raising the first violation.
    pub fn validate_strict(&self, document: &Map) -> ValidationResult<()> {
        self.run(document, ValidationMode::Strict).map(|_| ())
    }

    /// Validates, returning every violation.
    pub fn collect(&self, document: &Map) -> Vec<Violation> {
        match self.run(document, ValidationMode::Collect) {
            Ok(violations) => violations,
            // collect mode never raises
            Err(e) => vec![e.violation().clone()],
        }
    }

    /// Runs structure, required field and size checks in that order.
    pub fn run(&self, document: &Map, mode: ValidationMode) -> ValidationResult<Vec<Violation>> {
        let mut walker = Walker::new(mode, self.authorized, self.policy);

        walker.walk_mapping(self.structure, document, "")?;
        self.check_required(&mut walker, document)?;

        if walker.violations.is_empty() {
            self.check_size(&mut walker, document)?;
        }

        debug!(
            violations = walker.violations.len(),
            ?mode,
            "structure validation finished"
        );
        Ok(walker.violations)
    }

    /// Fields already listed as missed by the walk are not reported again.
    fn check_required(&self, walker: &mut Walker<'_>, document: &Map) -> ValidationResult<()> {
        let missed: Vec<&String> = walker
            .violations
            .iter()
            .filter_map(|v| match &v.kind {
                ViolationKind::MissedFields(fields) => Some(fields),
                _ => None,
            })
            .flatten()
            .collect();

        let missing: Vec<String> = self
            .policy
            .required_fields
            .iter()
            .filter(|field| !missed.contains(field))
            .filter(|field| {
                FieldPath::parse(field)
                    .lookup_map(document)
                    .map_or(true, Value::is_null)
            })
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        walker.report(Violation::new("", ViolationKind::RequiredFields(missing)))
    }

    fn check_size(&self, walker: &mut Walker<'_>, document: &Map) -> ValidationResult<()> {
        let stored = match self.root.storage_map(document) {
            Ok(stored) => stored,
            Err(e) => {
                let path = e.path.clone().unwrap_or_default();
                return walker.report(Violation::new(path, ViolationKind::Custom { message: e.message }));
            }
        };

        let size = document_size(&stored);
        let limit = self.config.max_document_size;
        if size > limit {
            warn!(size, limit, "document exceeds maximum size");
            return walker.report(Violation::new("", ViolationKind::DocumentTooLarge { size, limit }));
        }
        Ok(())
    }
}

struct Walker<'a> {
    mode: ValidationMode,
    authorized: &'a AuthorizedTypes,
    policy: &'a FieldPolicy,
    violations: Vec<Violation>,
    /// Number of typed raw mappings above the current node
    raw_depth: usize,
}

impl<'a> Walker<'a> {
    fn new(mode: ValidationMode, authorized: &'a AuthorizedTypes, policy: &'a FieldPolicy) -> Self {
        Self {
            mode,
            authorized,
            policy,
            violations: Vec::new(),
            raw_depth: 0,
        }
    }

    /// Records a violation, or aborts the walk in strict mode.
    fn report(&mut self, violation: Violation) -> ValidationResult<()> {
        match self.mode {
            ValidationMode::Strict => Err(ValidationError::from(violation)),
            ValidationMode::Collect => {
                self.violations.push(violation);
                Ok(())
            }
        }
    }

    fn mismatch(&mut self, path: &str, expected: String, actual: String) -> ValidationResult<()> {
        self.report(Violation::new(
            path,
            ViolationKind::TypeMismatch { expected, actual },
        ))
    }

    /// Whether `value` satisfies `descriptor`, without recording anything.
    fn satisfies(&self, descriptor: &Descriptor, value: &Value, path: &str) -> bool {
        let mut quiet = Walker::new(ValidationMode::Strict, self.authorized, self.policy);
        quiet.raw_depth = self.raw_depth;
        quiet.walk(descriptor, value, path).is_ok()
    }

    fn walk(&mut self, descriptor: &Descriptor, value: &Value, path: &str) -> ValidationResult<()> {
        if value.is_null() {
            return Ok(());
        }

        match descriptor {
            Descriptor::Untyped => self.check_authorized(value, path),
            Descriptor::Primitive(tag) => {
                if tag.accepts(value) {
                    Ok(())
                } else {
                    self.mismatch(path, tag.to_string(), value.type_name().to_string())
                }
            }
            Descriptor::Mapping(fields) => match value {
                Value::Map(map) => self.walk_mapping(fields, map, path),
                other => self.mismatch(path, "map".into(), other.type_name().into()),
            },
            Descriptor::RawMapping => match value {
                Value::Map(_) => Ok(()),
                other => self.mismatch(path, "map".into(), other.type_name().into()),
            },
            Descriptor::TypedRawMapping { key, value: element } => {
                let map = match value {
                    Value::Map(map) => map,
                    other => return self.mismatch(path, descriptor.to_string(), other.type_name().into()),
                };
                self.raw_depth += 1;
                let result = self.walk_typed_entries(*key, element, map, path);
                self.raw_depth -= 1;
                result
            }
            Descriptor::List(element) => {
                let items = match value {
                    Value::List(items) => items,
                    other => return self.mismatch(path, "list".into(), other.type_name().into()),
                };
                for (i, item) in items.iter().enumerate() {
                    let item_path = index_path(path, i);
                    match element {
                        Some(element) => self.walk(element, item, &item_path)?,
                        None => self.check_authorized(item, &item_path)?,
                    }
                }
                Ok(())
            }
            Descriptor::Tuple(elements) => {
                let items = match value {
                    Value::List(items) => items,
                    other => return self.mismatch(path, descriptor.to_string(), other.type_name().into()),
                };
                if items.len() != elements.len() {
                    return self.report(Violation::new(
                        path,
                        ViolationKind::Arity {
                            expected: elements.len(),
                            actual: items.len(),
                        },
                    ));
                }
                for (i, (element, item)) in elements.iter().zip(items).enumerate() {
                    self.walk(element, item, &index_path(path, i))?;
                }
                Ok(())
            }
            Descriptor::Or(alternatives) => {
                if alternatives.iter().any(|a| self.satisfies(a, value, path)) {
                    Ok(())
                } else {
                    self.mismatch(path, descriptor.to_string(), value.type_name().into())
                }
            }
            Descriptor::Not(exclusions) => {
                if exclusions.iter().any(|e| self.satisfies(e, value, path)) {
                    self.mismatch(path, descriptor.to_string(), value.type_name().into())
                } else {
                    Ok(())
                }
            }
            Descriptor::Enum(allowed) => {
                if allowed.iter().any(|literal| literal_matches(literal, value)) {
                    Ok(())
                } else {
                    self.mismatch(path, descriptor.to_string(), value.to_string())
                }
            }
            Descriptor::Custom(custom) => self.walk_custom(custom.as_ref(), value, path),
        }
    }

    /// Checks key types, then values. Nested mappings below here are not
    /// key-set checked.
    fn walk_typed_entries(
        &mut self,
        key: TypeTag,
        element: &Descriptor,
        map: &Map,
        path: &str,
    ) -> ValidationResult<()> {
        for (k, item) in map {
            let item_path = child_path(path, &k.to_string());
            let key_value = k.to_value();
            if !key.accepts(&key_value) {
                self.mismatch(
                    &item_path,
                    format!("{} key", key),
                    format!("{} key", key_value.type_name()),
                )?;
                continue;
            }
            self.walk(element, item, &item_path)?;
        }
        Ok(())
    }

    /// Checks presence and unknown keys, then descends into declared fields.
    fn walk_mapping(
        &mut self,
        fields: &BTreeMap<String, Descriptor>,
        map: &Map,
        path: &str,
    ) -> ValidationResult<()> {
        if !self.policy.use_schemaless && self.raw_depth == 0 {
            let unknown: Vec<String> = map
                .keys()
                .filter(|k| k.as_str().map_or(true, |name| !fields.contains_key(name)))
                .map(|k| child_path(path, &k.to_string()))
                .collect();
            if !unknown.is_empty() {
                self.report(Violation::new(path, ViolationKind::UnknownFields(unknown)))?;
            }

            let missed: Vec<String> = fields
                .keys()
                .filter(|name| !map.contains_key(&Key::Text(name.to_string())))
                .map(|name| child_path(path, name))
                .filter(|field| !self.is_optional(field))
                .collect();
            if !missed.is_empty() {
                self.report(Violation::new(path, ViolationKind::MissedFields(missed)))?;
            }
        }

        for (name, descriptor) in fields {
            if let Some(item) = map.get(&Key::Text(name.clone())) {
                self.walk(descriptor, item, &child_path(path, name))?;
            }
        }
        Ok(())
    }

    /// Accepts either form: native values are converted to check the
    /// storage tag, stored values are converted to run the hook.
    fn walk_custom(&mut self, custom: &dyn CustomType, value: &Value, path: &str) -> ValidationResult<()> {
        let storage_tag = custom.storage_type();
        let is_native = custom
            .native_type()
            .map_or(value.tag() != Some(storage_tag), |t| value.tag() == Some(t));

        let native = if is_native {
            let stored = match custom.to_storage(value) {
                Ok(stored) => stored,
                Err(e) => return self.custom_failure(path, e.message),
            };
            if !storage_tag.accepts(&stored) {
                return self.mismatch(path, storage_tag.to_string(), stored.type_name().into());
            }
            value.clone()
        } else if storage_tag.accepts(value) {
            match custom.to_native(value) {
                Ok(native) => native,
                Err(e) => return self.custom_failure(path, e.message),
            }
        } else {
            let expected = match custom.native_type() {
                Some(native) => format!("{} or {}", native, storage_tag),
                None => storage_tag.to_string(),
            };
            return self.mismatch(path, expected, value.type_name().into());
        };

        match custom.validate(&native, path) {
            Ok(()) => Ok(()),
            Err(e) => {
                let e = e.at(path);
                let at = e.path.unwrap_or_default();
                self.custom_failure(&at, e.message)
            }
        }
    }

    fn custom_failure(&mut self, path: &str, message: String) -> ValidationResult<()> {
        self.report(Violation::new(path, ViolationKind::Custom { message }))
    }

    /// Every nested value must carry an authorized tag.
    fn check_authorized(&mut self, value: &Value, path: &str) -> ValidationResult<()> {
        if !self.authorized.allows(value) {
            return self.report(Violation::new(
                path,
                ViolationKind::NotAuthorized {
                    type_name: value.type_name().to_string(),
                },
            ));
        }
        match value {
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.check_authorized(item, &index_path(path, i))?;
                }
            }
            Value::Map(map) => {
                for (k, item) in map {
                    self.check_authorized(item, &child_path(path, &k.to_string()))?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn is_optional(&self, field: &str) -> bool {
        let schema_path = FieldPath::parse(field).schema_path();
        self.policy.optional_fields.iter().any(|f| *f == schema_path)
    }
}

/// Literal equality, treating both integer widths as one type.
fn literal_matches(literal: &Value, value: &Value) -> bool {
    match (literal.as_i64(), value.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => literal == value,
    }
}
