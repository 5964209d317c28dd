//! CLI command implementations
//!
//! Every command loads the configuration, then the class definitions in the
//! configured structures directory, before doing its own work.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::document::{Document, DocumentClass};
use crate::schema::{CustomTypeRegistry, StructureLoader, ValidationMode, DEFAULT_MAX_DOCUMENT_SIZE};
use crate::value::Value;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_documents, write_error, write_line, write_ok, write_violations};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `structure_<name>.json` files (required)
    pub structures_dir: String,

    /// Size ceiling for classes that do not set one (optional, default 16MB)
    #[serde(default = "default_max_document_size")]
    pub max_document_size: usize,

    /// Report every violation instead of the first (optional, default true)
    #[serde(default = "default_collect")]
    pub collect: bool,
}

fn default_max_document_size() -> usize {
    DEFAULT_MAX_DOCUMENT_SIZE
}
fn default_collect() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.structures_dir.trim().is_empty() {
            return Err(CliError::config_error("structures_dir must not be empty"));
        }

        if self.max_document_size == 0 {
            return Err(CliError::config_error("max_document_size must be > 0"));
        }

        Ok(())
    }

    /// Get structures directory as Path
    pub fn structures_path(&self) -> &Path {
        Path::new(&self.structures_dir)
    }

    pub fn mode(&self) -> ValidationMode {
        if self.collect {
            ValidationMode::Collect
        } else {
            ValidationMode::Strict
        }
    }

    /// Loads every class definition under the structures directory.
    pub fn load_structures(&self) -> CliResult<StructureLoader> {
        let mut loader = StructureLoader::new(self.structures_path(), CustomTypeRegistry::with_builtins())
            .with_default_max_document_size(self.max_document_size);
        loader.load_all()?;
        Ok(loader)
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    init_tracing();
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // a subscriber may already be installed by an embedding process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check { config } => check(&config),
        Command::Validate { config, class } => validate(&config, &class),
        Command::Skeleton { config, class } => skeleton(&config, &class),
    }
}

/// Load and build every class definition
///
/// Writes `{"status": "ok", "classes": [...]}` on success. The first
/// definition error aborts the command.
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let loader = config.load_structures()?;

    let classes: Vec<&str> = loader.classes().map(|c| c.name()).collect();
    info!(classes = classes.len(), "class definitions are valid");

    let mut stdout = io::stdout().lock();
    write_line(&mut stdout, &json!({"status": "ok", "classes": classes}))
}

/// Validate documents from stdin against one class
pub fn validate(config_path: &Path, class_name: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let loader = config.load_structures()?;
    let class = loader
        .get(class_name)
        .ok_or_else(|| CliError::unknown_class(class_name))?;

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    validate_stream(class, config.mode(), stdin.lock(), &mut stdout)
}

/// Validates each input line, writing one result line per document.
///
/// Malformed lines produce an error line and do not stop the stream.
pub fn validate_stream<R: BufRead, W: Write>(
    class: &Arc<DocumentClass>,
    mode: ValidationMode,
    reader: R,
    out: &mut W,
) -> CliResult<()> {
    let mut count = 0usize;
    for document in read_documents(reader) {
        count += 1;
        let json = match document {
            Ok(json) => json,
            Err(e) => {
                write_error(out, e.code_str(), e.message())?;
                continue;
            }
        };

        let stored = match Value::from_json(&json) {
            Value::Map(map) => map,
            other => {
                let message = format!("document must be a JSON object, found {}", other.type_name());
                write_error(out, "AERO_CLI_IO_ERROR", &message)?;
                continue;
            }
        };

        let mut doc = match Document::from_storage(class, stored) {
            Ok(doc) => doc,
            Err(e) => {
                let e = CliError::from(e);
                write_error(out, e.code_str(), e.message())?;
                continue;
            }
        };

        match doc.validate_with(mode) {
            Ok([]) => write_ok(out)?,
            Ok(violations) => write_violations(out, violations)?,
            Err(e) => write_violations(out, std::slice::from_ref(e.violation()))?,
        }
    }
    debug!(class = %class.name(), documents = count, "validation stream finished");
    Ok(())
}

/// Print the default document of a class
pub fn skeleton(config_path: &Path, class_name: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let loader = config.load_structures()?;
    let class = loader
        .get(class_name)
        .ok_or_else(|| CliError::unknown_class(class_name))?;

    let json = Document::new(class).to_json()?;
    let mut stdout = io::stdout().lock();
    write_line(&mut stdout, &json)
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use serde_json::Value as JsonValue;
    use tempfile::TempDir;

    fn create_config(temp_dir: &TempDir) -> std::path::PathBuf {
        let config_path = temp_dir.path().join("aerokit.json");
        let structures_dir = temp_dir.path().join("structures");
        fs::create_dir_all(&structures_dir).unwrap();

        let definition = json!({
            "name": "blog_post",
            "structure": {"title": "text", "rank": "int"},
            "required_fields": ["title"]
        });
        fs::write(
            structures_dir.join("structure_blog_post.json"),
            definition.to_string(),
        )
        .unwrap();

        let config = json!({
            "structures_dir": structures_dir.to_string_lossy()
        });

        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    fn run_stream(input: &str, mode: ValidationMode) -> Vec<JsonValue> {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&create_config(&temp_dir)).unwrap();
        let loader = config.load_structures().unwrap();
        let class = loader.get("blog_post").unwrap();

        let mut out = Vec::new();
        validate_stream(class, mode, input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_check_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);
        check(&config_path).unwrap();
    }

    #[test]
    fn test_check_reports_definition_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);
        fs::write(
            temp_dir.path().join("structures").join("structure_bad.json"),
            json!({"name": "bad", "structure": {"a": "unicode"}}).to_string(),
        )
        .unwrap();

        let err = check(&config_path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::DefinitionError);
        assert!(err.message().contains("structure_bad.json"));
    }

    #[test]
    fn test_validate_stream_results() {
        let input = concat!(
            "{\"title\": \"Hi\", \"rank\": 1}\n",
            "{\"title\": \"Hi\", \"rank\": \"x\", \"extra\": true}\n",
            "[1, 2]\n",
            "{broken\n",
        );
        let lines = run_stream(input, ValidationMode::Collect);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], json!({"status": "ok"}));
        assert_eq!(lines[1]["violations"].as_array().unwrap().len(), 2);
        assert_eq!(lines[1]["violations"][0]["message"], "unknown fields : ['extra']");
        assert_eq!(lines[2]["code"], "AERO_CLI_IO_ERROR");
        assert_eq!(lines[3]["status"], "error");
    }

    #[test]
    fn test_validate_stream_strict_reports_first() {
        let lines = run_stream(
            "{\"title\": \"Hi\", \"rank\": \"x\", \"extra\": true}\n",
            ValidationMode::Strict,
        );
        assert_eq!(lines[0]["violations"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_class() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);
        let err = skeleton(&config_path, "ghost").unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::UnknownClass);
    }

    #[test]
    fn test_config_rejects_zero_size() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("aerokit.json");

        let config = json!({
            "structures_dir": temp_dir.path().to_string_lossy(),
            "max_document_size": 0
        });

        fs::write(&config_path, config.to_string()).unwrap();

        let result = Config::load(&config_path);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("aerokit.json");

        let config_json = json!({
            "structures_dir": temp_dir.path().to_string_lossy()
        });

        fs::write(&config_path, config_json.to_string()).unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.max_document_size, 16_777_216);
        assert!(config.collect);
        assert_eq!(config.mode(), ValidationMode::Collect);
    }
}
