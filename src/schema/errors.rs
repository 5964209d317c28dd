//! Structure error types
//!
//! Error codes:
//! - AERO_DEFINITION_ERROR (FATAL)
//! - AERO_STRUCTURE_ERROR (REJECT)
//! - AERO_SCHEMA_TYPE_ERROR (REJECT)
//! - AERO_AUTHORIZED_TYPE_ERROR (REJECT)
//! - AERO_CUSTOM_TYPE_ERROR (REJECT)
//! - AERO_MAX_DOCUMENT_SIZE (REJECT)

use std::fmt;

use thiserror::Error;

use crate::value::ScalarError;

/// Severity levels for structure errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Document rejected, caller may fix it and retry
    Reject,
    /// Class definition is unusable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

// =============================================================================
// Definition errors
// =============================================================================

/// Malformed structure declaration, raised when a class is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct DefinitionError {
    /// Class name, or file path for loader errors
    pub class: String,
    pub message: String,
}

impl DefinitionError {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Unreadable or malformed class definition file
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(path, format!("malformed class definition: {}", reason.into()))
    }

    pub fn code(&self) -> &'static str {
        "AERO_DEFINITION_ERROR"
    }

    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

// =============================================================================
// Violations
// =============================================================================

/// What went wrong at a path
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    /// Keys present in a mapping but not declared
    UnknownFields(Vec<String>),
    /// Declared keys absent from a mapping
    MissedFields(Vec<String>),
    /// Required fields absent or null
    RequiredFields(Vec<String>),
    TypeMismatch { expected: String, actual: String },
    Arity { expected: usize, actual: usize },
    NotAuthorized { type_name: String },
    /// Custom type hook or conversion failure
    Custom { message: String },
    DocumentTooLarge { size: usize, limit: usize },
}

/// A single path-qualified validation failure.
///
/// The path is empty for violations on the document root.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Field list for unknown, missed and required field violations.
    pub fn fields(&self) -> &[String] {
        match &self.kind {
            ViolationKind::UnknownFields(f)
            | ViolationKind::MissedFields(f)
            | ViolationKind::RequiredFields(f) => f,
            _ => &[],
        }
    }

    /// Expected type or condition
    pub fn expected(&self) -> String {
        match &self.kind {
            ViolationKind::UnknownFields(_) => "no undeclared fields".into(),
            ViolationKind::MissedFields(_) => "declared fields to be present".into(),
            ViolationKind::RequiredFields(_) => "required fields to be set".into(),
            ViolationKind::TypeMismatch { expected, .. } => expected.clone(),
            ViolationKind::Arity { expected, .. } => format!("{} items", expected),
            ViolationKind::NotAuthorized { .. } => "an authorized type".into(),
            ViolationKind::Custom { .. } => "a valid custom value".into(),
            ViolationKind::DocumentTooLarge { limit, .. } => format!("at most {} bytes", limit),
        }
    }

    /// Observed value or type
    pub fn actual(&self) -> String {
        match &self.kind {
            ViolationKind::UnknownFields(f)
            | ViolationKind::MissedFields(f)
            | ViolationKind::RequiredFields(f) => format_fields(f),
            ViolationKind::TypeMismatch { actual, .. } => actual.clone(),
            ViolationKind::Arity { actual, .. } => format!("{} items", actual),
            ViolationKind::NotAuthorized { type_name } => type_name.clone(),
            ViolationKind::Custom { message } => message.clone(),
            ViolationKind::DocumentTooLarge { size, .. } => format!("{} bytes", size),
        }
    }

    /// Classifies the violation into the error raised in strict mode.
    pub fn into_error(self) -> ValidationError {
        match self.kind {
            ViolationKind::UnknownFields(_)
            | ViolationKind::MissedFields(_)
            | ViolationKind::RequiredFields(_) => ValidationError::Structure(self),
            ViolationKind::TypeMismatch { .. } | ViolationKind::Arity { .. } => {
                ValidationError::SchemaType(self)
            }
            ViolationKind::NotAuthorized { .. } => ValidationError::AuthorizedType(self),
            ViolationKind::Custom { .. } => ValidationError::CustomType(self),
            ViolationKind::DocumentTooLarge { .. } => ValidationError::MaxDocumentSize(self),
        }
    }
}

fn format_fields(fields: &[String]) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("'{}'", f)).collect();
    format!("[{}]", quoted.join(", "))
}

impl Violation {
    /// Root violations carry no path prefix.
    fn write_path(&self, f: &mut fmt::Formatter<'_>, separator: &str) -> fmt::Result {
        if self.path.is_empty() {
            Ok(())
        } else {
            write!(f, "{}{}", self.path, separator)
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::UnknownFields(fields) => {
                write!(f, "unknown fields : {}", format_fields(fields))
            }
            ViolationKind::MissedFields(fields) => {
                write!(f, "missed fields : {}", format_fields(fields))
            }
            ViolationKind::RequiredFields(fields) => {
                write!(f, "required fields : {}", format_fields(fields))
            }
            ViolationKind::TypeMismatch { expected, actual } => {
                self.write_path(f, " ")?;
                write!(f, "must be an instance of {} not {}", expected, actual)
            }
            ViolationKind::Arity { expected, actual } => {
                self.write_path(f, " ")?;
                write!(f, "must have {} items not {}", expected, actual)
            }
            ViolationKind::NotAuthorized { type_name } => {
                self.write_path(f, ": ")?;
                write!(f, "{} is not an authorized type", type_name)
            }
            ViolationKind::Custom { message } => {
                self.write_path(f, ": ")?;
                write!(f, "{}", message)
            }
            ViolationKind::DocumentTooLarge { size, limit } => write!(
                f,
                "document size is too big, documents lower than {} bytes are allowed (got {} bytes)",
                limit, size
            ),
        }
    }
}

// =============================================================================
// Validation errors
// =============================================================================

/// Error raised by strict validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Required field missing or unknown field present
    #[error("{0}")]
    Structure(Violation),

    /// Runtime type does not satisfy its descriptor
    #[error("{0}")]
    SchemaType(Violation),

    /// Runtime type is outside the authorized set
    #[error("{0}")]
    AuthorizedType(Violation),

    /// Custom type validation hook or conversion failed
    #[error("{0}")]
    CustomType(Violation),

    /// Encoded document exceeds the size ceiling
    #[error("{0}")]
    MaxDocumentSize(Violation),
}

impl ValidationError {
    pub fn violation(&self) -> &Violation {
        match self {
            ValidationError::Structure(v)
            | ValidationError::SchemaType(v)
            | ValidationError::AuthorizedType(v)
            | ValidationError::CustomType(v)
            | ValidationError::MaxDocumentSize(v) => v,
        }
    }

    pub fn path(&self) -> &str {
        &self.violation().path
    }

    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Structure(_) => "AERO_STRUCTURE_ERROR",
            ValidationError::SchemaType(_) => "AERO_SCHEMA_TYPE_ERROR",
            ValidationError::AuthorizedType(_) => "AERO_AUTHORIZED_TYPE_ERROR",
            ValidationError::CustomType(_) => "AERO_CUSTOM_TYPE_ERROR",
            ValidationError::MaxDocumentSize(_) => "AERO_MAX_DOCUMENT_SIZE",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl From<Violation> for ValidationError {
    fn from(v: Violation) -> Self {
        v.into_error()
    }
}

/// Result type for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field access and conversion errors
// =============================================================================

/// Errors raised by path-addressed field access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("empty field path")]
    EmptyPath,

    #[error("'{path}' holds a {found}, not a map or list")]
    NotAContainer { path: String, found: String },

    #[error("'{path}': index {index} out of range for {len} items")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("'{path}': '{segment}' is not a list index")]
    InvalidIndex { path: String, segment: String },
}

/// Failure inside a custom type converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    pub path: Option<String>,
    pub message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
        }
    }

    /// Qualifies the error with a field path unless it already has one.
    pub fn at(mut self, path: &str) -> Self {
        if self.path.is_none() {
            self.path = Some(path.to_string());
        }
        self
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ConversionError {}

/// Crate-level error
#[derive(Debug, Error)]
pub enum KitError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Scalar(#[from] ScalarError),
}

/// Crate-level result
pub type KitResult<T> = Result<T, KitError>;
