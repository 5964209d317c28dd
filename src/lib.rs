//! aerokit - structure validation and document mapping for document stores
//!
//! Document classes declare the expected shape of their documents once.
//! Documents are validated against that shape on demand or at the save
//! boundary, with custom types converted between native and storage form.

pub mod cli;
pub mod document;
pub mod schema;
pub mod value;

pub use document::{Document, DocumentClass, DocumentClassBuilder, DocumentState};
pub use schema::{
    decl, AuthorizedTypes, CustomType, CustomTypeRegistry, Decl, DefinitionError, Descriptor,
    KitError, KitResult, TypeTag, ValidationError, ValidationMode, Violation,
};
pub use value::{Key, Map, Value};
