//! `.ppl` file reader: yields cleaned command lines.

use std::path::Path;

use crate::error::{PplError, Result};

/// Strip a trailing inline comment.
///
/// A comment starts at a `#` that is preceded by at least one whitespace
/// character; a `#` glued to non-whitespace (e.g. a quoted `"#"` value)
/// is part of the command.
pub fn strip_inline_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        if b == b'#' && idx > 0 && bytes[idx - 1].is_ascii_whitespace() {
            return line[..idx].trim_end();
        }
    }
    line
}

/// Read a `.ppl` pipeline file and return its cleaned lines.
///
/// Each raw line is trimmed; blank lines and `#`-prefixed comment lines
/// are dropped, and trailing inline comments are stripped.
pub fn read_ppl_file(path: &str) -> Result<Vec<String>> {
    if !path.ends_with(".ppl") {
        return Err(PplError::Value(format!(
            "Expected a .ppl file, got: '{path}'"
        )));
    }
    if !Path::new(path).exists() {
        return Err(PplError::NotFound(format!(
            "Pipeline file not found: '{path}'"
        )));
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PplError::Runtime(format!("could not read '{path}': {e}")))?;

    let lines: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| strip_inline_comment(l).to_string())
        .collect();
    tracing::debug!(path, count = lines.len(), "read pipeline lines");
    Ok(lines)
}
