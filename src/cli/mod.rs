//! CLI module for aerokit
//!
//! Provides command-line interface for:
//! - check: Load and build every class definition
//! - validate: Validate JSON documents from stdin
//! - skeleton: Print the default document of a class

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, run, run_command, skeleton, validate, validate_stream, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_documents, write_error, write_line, write_ok, write_violations};
