//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code.

use std::fmt;
use std::io;

use crate::schema::{ConversionError, DefinitionError};

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Class definition could not be loaded or built
    DefinitionError,
    /// No class with the requested name
    UnknownClass,
    /// Document could not be converted to or from storage form
    ConversionError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::DefinitionError => "AERO_DEFINITION_ERROR",
            Self::UnknownClass => "AERO_CLI_UNKNOWN_CLASS",
            Self::ConversionError => "AERO_CONVERSION_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn unknown_class(name: &str) -> Self {
        Self::new(
            CliErrorCode::UnknownClass,
            format!("class '{}' is not defined. Run 'aerokit check' to list classes.", name),
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<DefinitionError> for CliError {
    fn from(e: DefinitionError) -> Self {
        Self::new(CliErrorCode::DefinitionError, e.to_string())
    }
}

impl From<ConversionError> for CliError {
    fn from(e: ConversionError) -> Self {
        Self::new(CliErrorCode::ConversionError, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
