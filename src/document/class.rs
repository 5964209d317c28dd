//! Document classes
//!
//! A class binds a name to a parsed structure, its field policy and its
//! validation settings. It is built once, shared through an `Arc` and never
//! mutated afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::schema::{
    validate, AuthorizedTypes, CustomTypeRegistry, Decl, DefinitionError, Descriptor, FieldPolicy,
    ParseContext, StructureValidator, TypeTag, ValidationConfig, ValidationMode,
};
use crate::value::{FieldPath, Map, Value};

/// Immutable description of a document class
#[derive(Debug)]
pub struct DocumentClass {
    name: String,
    structure: Descriptor,
    policy: FieldPolicy,
    config: ValidationConfig,
    authorized: AuthorizedTypes,
    skip_validation: bool,
    default_values: BTreeMap<String, Value>,
    /// Skeleton with explicit defaults applied, cloned into new documents
    template: Map,
}

impl DocumentClass {
    pub fn builder(name: impl Into<String>) -> DocumentClassBuilder {
        DocumentClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root descriptor; always a [`Descriptor::Mapping`].
    pub fn structure(&self) -> &Descriptor {
        &self.structure
    }

    /// Declared top-level fields
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        let fields = match &self.structure {
            Descriptor::Mapping(fields) => Some(fields),
            _ => None,
        };
        fields
            .into_iter()
            .flat_map(|f| f.iter().map(|(name, d)| (name.as_str(), d)))
    }

    pub fn policy(&self) -> &FieldPolicy {
        &self.policy
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn authorized(&self) -> &AuthorizedTypes {
        &self.authorized
    }

    pub fn is_schemaless(&self) -> bool {
        self.policy.use_schemaless
    }

    /// Whether the save boundary skips validation.
    pub fn skip_validation(&self) -> bool {
        self.skip_validation
    }

    pub fn default_values(&self) -> &BTreeMap<String, Value> {
        &self.default_values
    }

    /// Contents of a freshly constructed document.
    pub fn template(&self) -> &Map {
        &self.template
    }

    pub fn validator(&self) -> StructureValidator<'_> {
        StructureValidator::new(&self.structure, &self.authorized, &self.policy, &self.config)
    }
}

/// Builder for [`DocumentClass`]
///
/// ```ignore
/// let class = DocumentClass::builder("BlogPost")
///     .structure(decl::map([("title", TypeTag::Text), ("rank", TypeTag::Int)]))
///     .required_fields(["title"])
///     .default_value("rank", 0)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct DocumentClassBuilder {
    name: String,
    structure: Option<Decl>,
    required_fields: Vec<String>,
    optional_fields: Vec<String>,
    default_values: Vec<(String, Value)>,
    use_schemaless: bool,
    raise_validation_errors: bool,
    skip_validation: bool,
    max_document_size: Option<usize>,
    authorized: Option<AuthorizedTypes>,
    registry: Option<CustomTypeRegistry>,
}

impl DocumentClassBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            structure: None,
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
            default_values: Vec::new(),
            use_schemaless: false,
            raise_validation_errors: true,
            skip_validation: false,
            max_document_size: None,
            authorized: None,
            registry: None,
        }
    }

    /// Root structure; must be a mapping declaration.
    pub fn structure(mut self, structure: Decl) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn optional_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn default_value(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_values.push((path.into(), value.into()));
        self
    }

    pub fn use_schemaless(mut self, enabled: bool) -> Self {
        self.use_schemaless = enabled;
        self
    }

    /// `false` switches [`Document::validate`] to collect mode.
    ///
    /// [`Document::validate`]: super::Document::validate
    pub fn raise_validation_errors(mut self, enabled: bool) -> Self {
        self.raise_validation_errors = enabled;
        self
    }

    pub fn skip_validation(mut self, enabled: bool) -> Self {
        self.skip_validation = enabled;
        self
    }

    pub fn max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size = Some(bytes);
        self
    }

    /// Overrides the process-wide authorized types for this class.
    pub fn authorized_types(mut self, authorized: AuthorizedTypes) -> Self {
        self.authorized = Some(authorized);
        self
    }

    /// Adds one tag to this class's authorized types.
    pub fn authorize(mut self, tag: TypeTag) -> Self {
        let base = self
            .authorized
            .take()
            .unwrap_or_else(|| AuthorizedTypes::global().clone());
        self.authorized = Some(base.with(tag));
        self
    }

    /// Registry used to resolve custom type names.
    pub fn custom_types(mut self, registry: CustomTypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Parses the structure and checks every field list against it.
    pub fn build(self) -> Result<Arc<DocumentClass>, DefinitionError> {
        let authorized = self
            .authorized
            .unwrap_or_else(|| AuthorizedTypes::global().clone());
        let registry = self.registry.unwrap_or_else(CustomTypeRegistry::with_builtins);
        let ctx = ParseContext {
            class: &self.name,
            authorized: &authorized,
            registry: &registry,
        };

        let fields = match &self.structure {
            None => BTreeMap::new(),
            Some(Decl::Map(fields)) => Descriptor::parse_fields(fields, &ctx)?,
            Some(_) => {
                return Err(DefinitionError::new(&self.name, "structure must be a mapping"));
            }
        };
        let field_count = fields.len();
        let structure = Descriptor::Mapping(fields);

        for (list, paths) in [
            ("required_fields", &self.required_fields),
            ("optional_fields", &self.optional_fields),
        ] {
            for path in paths {
                let schema_path = FieldPath::parse(path).schema_path();
                if structure.resolve(&schema_path).is_none() {
                    return Err(DefinitionError::new(
                        &self.name,
                        format!("error in {} : {} not found in structure", list, path),
                    ));
                }
            }
        }

        let mut template = if self.use_schemaless {
            Value::map()
        } else {
            structure.default_value()
        };
        let mut default_values = BTreeMap::new();
        for (path, value) in self.default_values {
            let field = structure.resolve(&path).ok_or_else(|| {
                DefinitionError::new(
                    &self.name,
                    format!("error in default_values : {} not found in structure", path),
                )
            })?;
            validate(field, &value, ValidationMode::Strict, &authorized).map_err(|e| {
                DefinitionError::new(
                    &self.name,
                    format!("error in default_values : {}: {}", path, e),
                )
            })?;
            FieldPath::parse(&path)
                .assign(&mut template, value.clone())
                .map_err(|e| {
                    DefinitionError::new(
                        &self.name,
                        format!("error in default_values : {}: {}", path, e),
                    )
                })?;
            default_values.insert(path, value);
        }
        let template = match template {
            Value::Map(map) => map,
            _ => Map::new(),
        };

        let mut config = ValidationConfig::default();
        if !self.raise_validation_errors {
            config.mode = ValidationMode::Collect;
        }
        if let Some(limit) = self.max_document_size {
            config.max_document_size = limit;
        }

        debug!(
            class = %self.name,
            fields = field_count,
            schemaless = self.use_schemaless,
            "document class built"
        );

        Ok(Arc::new(DocumentClass {
            name: self.name,
            structure,
            policy: FieldPolicy {
                use_schemaless: self.use_schemaless,
                required_fields: self.required_fields,
                optional_fields: self.optional_fields,
            },
            config,
            authorized,
            skip_validation: self.skip_validation,
            default_values,
            template,
        }))
    }
}
