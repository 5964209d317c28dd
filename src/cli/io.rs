//! JSON I/O handling for CLI
//!
//! - Input: one JSON document per line
//! - Output: one JSON object per line
//! - UTF-8 only

use std::io::{BufRead, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};
use crate::schema::Violation;

/// Reads JSON documents, one per line. Blank lines are skipped.
pub fn read_documents<R: BufRead>(reader: R) -> impl Iterator<Item = CliResult<Value>> {
    reader.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str(&line).map_err(CliError::from)),
        Err(e) => Some(Err(CliError::from(e))),
    })
}

/// Write a success line
pub fn write_ok<W: Write>(out: &mut W) -> CliResult<()> {
    write_line(out, &json!({"status": "ok"}))
}

/// Write a line listing violations
pub fn write_violations<W: Write>(out: &mut W, violations: &[Violation]) -> CliResult<()> {
    let violations: Vec<Value> = violations.iter().map(violation_json).collect();
    write_line(out, &json!({"status": "error", "violations": violations}))
}

/// Write an error line
pub fn write_error<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    write_line(
        out,
        &json!({
            "status": "error",
            "code": code,
            "message": message
        }),
    )
}

/// Write a JSON value on its own line
pub fn write_line<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn violation_json(violation: &Violation) -> Value {
    json!({
        "path": violation.path,
        "code": violation.clone().into_error().code(),
        "message": violation.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ViolationKind;

    #[test]
    fn test_read_skips_blank_lines() {
        let input = "{\"a\": 1}\n\n{\"b\": 2}\n";
        let docs: Vec<Value> = read_documents(input.as_bytes()).map(|d| d.unwrap()).collect();
        assert_eq!(docs, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_read_reports_bad_json() {
        let mut docs = read_documents("not json\n".as_bytes());
        assert!(docs.next().unwrap().is_err());
    }

    #[test]
    fn test_write_violations() {
        let mut out = Vec::new();
        let violation = Violation::new("", ViolationKind::UnknownFields(vec!["bar".into()]));
        write_violations(&mut out, &[violation]).unwrap();

        let line: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["status"], "error");
        assert_eq!(line["violations"][0]["code"], "AERO_STRUCTURE_ERROR");
        assert_eq!(line["violations"][0]["message"], "unknown fields : ['bar']");
    }
}
