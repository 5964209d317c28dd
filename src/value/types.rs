//! Scalar value types that have no direct Rust primitive counterpart
//!
//! - ObjectId: 12-byte opaque identifier generated client-side
//! - Binary: subtyped binary payload
//! - Pattern: stored regular expression with option flags

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Errors raised while constructing scalar values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalarError {
    /// Object id text is not 24 hex digits
    #[error("invalid object id '{0}'")]
    InvalidObjectId(String),

    /// Regular expression does not compile
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unsupported regular expression option flag
    #[error("unsupported pattern option '{0}'")]
    InvalidPatternOption(char),
}

// =============================================================================
// ObjectId
// =============================================================================

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// 12-byte opaque identifier.
///
/// Layout: 4-byte big-endian creation seconds, 5 bytes unique to the
/// process, 3-byte big-endian counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generates a new identifier.
    pub fn new() -> Self {
        let seconds = Utc::now().timestamp() as u32;
        let unique = PROCESS_UNIQUE.get_or_init(|| rand::thread_rng().gen());
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::thread_rng().gen_range(0..0x00FF_FFFF)));
        let count = counter.fetch_add(1, Ordering::SeqCst) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Creation time encoded in the first four bytes.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let mut secs = [0u8; 4];
        secs.copy_from_slice(&self.0[..4]);
        Utc.timestamp_opt(u32::from_be_bytes(secs) as i64, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ScalarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.is_ascii() {
            return Err(ScalarError::InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ScalarError::InvalidObjectId(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

// =============================================================================
// Binary
// =============================================================================

/// Binary payload with a storage subtype
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

impl Binary {
    /// Generic binary subtype
    pub const GENERIC: u8 = 0x00;

    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype: Self::GENERIC,
            bytes: bytes.into(),
        }
    }

    pub fn with_subtype(subtype: u8, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }
}

// =============================================================================
// Pattern
// =============================================================================

/// Stored regular expression.
///
/// The pattern is compiled on construction so an invalid expression never
/// reaches a document.
#[derive(Debug, Clone)]
pub struct Pattern {
    pattern: String,
    options: String,
    compiled: Regex,
}

impl Pattern {
    /// Compiles `pattern` with option flags drawn from `imsx`.
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Result<Self, ScalarError> {
        let pattern = pattern.into();
        let mut options: Vec<char> = options.into().chars().collect();
        options.sort_unstable();
        options.dedup();

        let mut builder = RegexBuilder::new(&pattern);
        for opt in &options {
            match opt {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => return Err(ScalarError::InvalidPatternOption(*other)),
            };
        }

        let compiled = builder.build().map_err(|e| ScalarError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern,
            options: options.into_iter().collect(),
            compiled,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.options == other.options
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_hex_roundtrip() {
        let id = ObjectId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 24);
        assert_eq!(hex.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn test_object_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_id_rejects_bad_text() {
        assert!("xyz".parse::<ObjectId>().is_err());
        assert!("zzzzzzzzzzzzzzzzzzzzzzzz".parse::<ObjectId>().is_err());
    }

    #[test]
    fn test_object_id_timestamp() {
        let before = Utc::now().timestamp();
        let id = ObjectId::new();
        assert!(id.timestamp().timestamp() >= before);
    }

    #[test]
    fn test_pattern_options_normalized() {
        let p = Pattern::new("^ab+c$", "mi").unwrap();
        assert_eq!(p.options(), "im");
        assert!(p.is_match("ABBC"));
        assert_eq!(p.to_string(), "/^ab+c$/im");
    }

    #[test]
    fn test_pattern_rejects_invalid() {
        assert!(matches!(
            Pattern::new("(unclosed", ""),
            Err(ScalarError::InvalidPattern { .. })
        ));
        assert_eq!(
            Pattern::new("a", "q").unwrap_err(),
            ScalarError::InvalidPatternOption('q')
        );
    }
}
