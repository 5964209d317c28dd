//! Structure subsystem
//!
//! Structures are declared once per document class and enforced on demand
//! or at the save boundary.
//!
//! # Design Principles
//!
//! - Declarations are parsed once; malformed ones fail at class build
//! - Descriptor trees are immutable and shared by every document
//! - Strict validation fails on the first violation
//! - Collect validation reports every violation, in traversal order
//! - Custom types are explicit registrations, looked up by name

pub mod decl;

mod custom;
mod descriptor;
mod errors;
mod loader;
mod types;
mod validator;

pub use custom::{CustomType, CustomTypeRegistry, SetOf};
pub use decl::Decl;
pub use descriptor::{Descriptor, ParseContext};
pub use errors::{
    ConversionError, DefinitionError, FieldError, KitError, KitResult, Severity, ValidationError,
    ValidationResult, Violation, ViolationKind,
};
pub use loader::{ClassDefinition, StructureLoader};
pub use types::{AuthorizedTypes, TypeTag};
pub use validator::{
    validate, FieldPolicy, StructureValidator, ValidationConfig, ValidationMode,
    DEFAULT_MAX_DOCUMENT_SIZE,
};
