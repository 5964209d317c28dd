//! Type tags and the authorized type set
//!
//! Primitive tags (storage scalars):
//! - bool, int, float, text
//! - binary, timestamp, object_id, regex, uuid, bytes
//!
//! Container tags: list, map, set. `set` is in-memory only and is not
//! authorized unless explicitly registered.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Runtime type tag of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Bool,
    /// Accepts both 32-bit and 64-bit integers
    Int,
    Float,
    Text,
    Binary,
    Timestamp,
    ObjectId,
    Regex,
    Uuid,
    Bytes,
    List,
    Map,
    Set,
}

impl TypeTag {
    pub const ALL: [TypeTag; 13] = [
        TypeTag::Bool,
        TypeTag::Int,
        TypeTag::Float,
        TypeTag::Text,
        TypeTag::Binary,
        TypeTag::Timestamp,
        TypeTag::ObjectId,
        TypeTag::Regex,
        TypeTag::Uuid,
        TypeTag::Bytes,
        TypeTag::List,
        TypeTag::Map,
        TypeTag::Set,
    ];

    /// Returns the type name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Text => "text",
            TypeTag::Binary => "binary",
            TypeTag::Timestamp => "timestamp",
            TypeTag::ObjectId => "object_id",
            TypeTag::Regex => "regex",
            TypeTag::Uuid => "uuid",
            TypeTag::Bytes => "bytes",
            TypeTag::List => "list",
            TypeTag::Map => "map",
            TypeTag::Set => "set",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Scalar storage kinds
    pub fn is_primitive(&self) -> bool {
        !matches!(self, TypeTag::List | TypeTag::Map | TypeTag::Set)
    }

    /// Whether the value's runtime type is one registered for this tag.
    ///
    /// Booleans never satisfy `int` or `float`.
    pub fn accepts(&self, value: &Value) -> bool {
        value.tag() == Some(*self)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

static GLOBAL_AUTHORIZED: OnceLock<AuthorizedTypes> = OnceLock::new();

/// Set of type tags a document may hold.
///
/// The process-wide set is fixed on first use. Classes may extend their own
/// copy with [`AuthorizedTypes::with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedTypes {
    tags: BTreeSet<TypeTag>,
}

impl Default for AuthorizedTypes {
    fn default() -> Self {
        Self {
            tags: TypeTag::ALL
                .iter()
                .copied()
                .filter(|t| *t != TypeTag::Set)
                .collect(),
        }
    }
}

impl AuthorizedTypes {
    pub fn empty() -> Self {
        Self {
            tags: BTreeSet::new(),
        }
    }

    /// Installs the process-wide set.
    ///
    /// Fails, returning the rejected set, once the global set has been
    /// installed or read.
    pub fn install(self) -> Result<(), AuthorizedTypes> {
        GLOBAL_AUTHORIZED.set(self)
    }

    /// The process-wide set, defaulting when nothing was installed.
    pub fn global() -> &'static AuthorizedTypes {
        GLOBAL_AUTHORIZED.get_or_init(AuthorizedTypes::default)
    }

    pub fn with(mut self, tag: TypeTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn without(mut self, tag: TypeTag) -> Self {
        self.tags.remove(&tag);
        self
    }

    pub fn contains(&self, tag: TypeTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Whether the value's own tag is authorized. Null always is.
    pub fn allows(&self, value: &Value) -> bool {
        value.tag().map_or(true, |t| self.contains(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeTag> + '_ {
        self.tags.iter().copied()
    }
}
