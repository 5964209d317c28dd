//! Structure loader for loading class definitions from disk
//!
//! - Definitions stored at `<structures_dir>/structure_<name>.json`
//! - One file per class
//! - Malformed files or declarations are definition errors naming the file
//! - A class name is defined once; redefinition is rejected

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use super::custom::CustomTypeRegistry;
use super::decl::Decl;
use super::errors::DefinitionError;
use crate::document::DocumentClass;
use crate::value::Value;

const FILE_PREFIX: &str = "structure_";

/// Serialized class definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    /// Root declaration in JSON form; `null` declares no fields.
    #[serde(default)]
    pub structure: JsonValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub default_values: JsonMap<String, JsonValue>,
    #[serde(default)]
    pub use_schemaless: bool,
    #[serde(default = "default_true")]
    pub raise_validation_errors: bool,
    #[serde(default)]
    pub skip_validation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_document_size: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>, structure: JsonValue) -> Self {
        Self {
            name: name.into(),
            structure,
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
            default_values: JsonMap::new(),
            use_schemaless: false,
            raise_validation_errors: true,
            skip_validation: false,
            max_document_size: None,
        }
    }

    /// File name the definition is stored under.
    pub fn file_name(&self) -> String {
        format!("{}{}.json", FILE_PREFIX, self.name)
    }

    /// Builds the class, resolving custom types against `registry`.
    pub fn build(&self, registry: &CustomTypeRegistry) -> Result<Arc<DocumentClass>, DefinitionError> {
        let mut builder = DocumentClass::builder(&self.name)
            .required_fields(self.required_fields.iter().cloned())
            .optional_fields(self.optional_fields.iter().cloned())
            .use_schemaless(self.use_schemaless)
            .raise_validation_errors(self.raise_validation_errors)
            .skip_validation(self.skip_validation)
            .custom_types(registry.clone());

        if !self.structure.is_null() {
            let decl = Decl::from_json(&self.structure)
                .map_err(|reason| DefinitionError::new(&self.name, reason))?;
            builder = builder.structure(decl);
        }
        for (path, value) in &self.default_values {
            builder = builder.default_value(path.clone(), Value::from_json(value));
        }
        if let Some(limit) = self.max_document_size {
            builder = builder.max_document_size(limit);
        }

        builder.build()
    }
}

/// Loads class definitions from disk and keeps the built classes.
pub struct StructureLoader {
    /// Directory containing definition files
    structures_dir: PathBuf,
    registry: CustomTypeRegistry,
    /// Applied to definitions that do not set their own limit
    default_max_document_size: Option<usize>,
    definitions: BTreeMap<String, ClassDefinition>,
    classes: BTreeMap<String, Arc<DocumentClass>>,
}

impl StructureLoader {
    pub fn new(structures_dir: impl Into<PathBuf>, registry: CustomTypeRegistry) -> Self {
        Self {
            structures_dir: structures_dir.into(),
            registry,
            default_max_document_size: None,
            definitions: BTreeMap::new(),
            classes: BTreeMap::new(),
        }
    }

    pub fn with_default_max_document_size(mut self, bytes: usize) -> Self {
        self.default_max_document_size = Some(bytes);
        self
    }

    pub fn structures_dir(&self) -> &Path {
        &self.structures_dir
    }

    /// Loads every definition file in the structures directory, in file
    /// name order.
    pub fn load_all(&mut self) -> Result<(), DefinitionError> {
        let dir = self.structures_dir.display().to_string();
        if !self.structures_dir.exists() {
            fs::create_dir_all(&self.structures_dir).map_err(|e| {
                DefinitionError::malformed(&dir, format!("failed to create structures directory: {}", e))
            })?;
            return Ok(());
        }

        let entries = fs::read_dir(&self.structures_dir).map_err(|e| {
            DefinitionError::malformed(&dir, format!("failed to read structures directory: {}", e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                DefinitionError::malformed(&dir, format!("failed to read directory entry: {}", e))
            })?;
            let path = entry.path();
            let is_definition = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"));
            if is_definition {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            self.load_file(&path)?;
        }
        debug!(dir = %dir, classes = self.classes.len(), "structures loaded");
        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<(), DefinitionError> {
        let file = path.display().to_string();
        let content = fs::read_to_string(path)
            .map_err(|e| DefinitionError::malformed(&file, format!("failed to read file: {}", e)))?;

        let definition: ClassDefinition = serde_json::from_str(&content)
            .map_err(|e| DefinitionError::malformed(&file, format!("invalid JSON: {}", e)))?;

        let expected = definition.file_name();
        if path.file_name().and_then(|n| n.to_str()) != Some(expected.as_str()) {
            return Err(DefinitionError::malformed(
                &file,
                format!("class '{}' must be stored as {}", definition.name, expected),
            ));
        }

        self.register(definition)
            .map(|_| ())
            .map_err(|e| DefinitionError::new(file, e.to_string()))
    }

    /// Builds and registers a definition.
    pub fn register(&mut self, mut definition: ClassDefinition) -> Result<Arc<DocumentClass>, DefinitionError> {
        if self.classes.contains_key(&definition.name) {
            return Err(DefinitionError::new(&definition.name, "class is already defined"));
        }
        if definition.max_document_size.is_none() {
            definition.max_document_size = self.default_max_document_size;
        }

        let class = definition.build(&self.registry)?;
        self.classes.insert(definition.name.clone(), Arc::clone(&class));
        self.definitions.insert(definition.name.clone(), definition);
        Ok(class)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DocumentClass>> {
        self.classes.get(name)
    }

    pub fn definition(&self, name: &str) -> Option<&ClassDefinition> {
        self.definitions.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Arc<DocumentClass>> {
        self.classes.values()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Writes a definition to the structures directory.
    ///
    /// The definition is built first so only valid classes reach disk.
    pub fn save(&self, definition: &ClassDefinition) -> Result<PathBuf, DefinitionError> {
        definition.build(&self.registry)?;

        let path = self.structures_dir.join(definition.file_name());
        let file = path.display().to_string();
        if path.exists() {
            return Err(DefinitionError::new(&definition.name, "class is already defined"));
        }

        if !self.structures_dir.exists() {
            fs::create_dir_all(&self.structures_dir).map_err(|e| {
                DefinitionError::malformed(
                    self.structures_dir.display().to_string(),
                    format!("failed to create structures directory: {}", e),
                )
            })?;
        }

        let content = serde_json::to_string_pretty(definition)
            .map_err(|e| DefinitionError::malformed(&file, format!("failed to serialize: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| DefinitionError::malformed(&file, format!("failed to write file: {}", e)))?;

        Ok(path)
    }
}
