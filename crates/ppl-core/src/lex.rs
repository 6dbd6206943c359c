//! Lexical helpers shared by the parser and the executor.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PplError, Result};

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Remove exactly one matched pair of surrounding single or double quotes.
pub fn strip_quotes(value: &str) -> String {
    let value = value.trim();
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Replace every `$NAME` token with the variable's value.
///
/// Fails with a key error on the first unknown name.
pub fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut missing: Option<String> = None;
    let substituted = VAR_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match variables.get(name) {
            Some(value) => value.clone(),
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(PplError::Key(format!("undefined variable '${name}'"))),
        None => Ok(substituted.into_owned()),
    }
}

/// Resolve a single value: `$name` is looked up, anything else passes
/// through unchanged.
pub fn resolve_value(value: &str, variables: &HashMap<String, String>) -> Result<String> {
    if let Some(name) = value.strip_prefix('$') {
        variables
            .get(name)
            .cloned()
            .ok_or_else(|| PplError::Key(format!("undefined variable '${name}'")))
    } else {
        Ok(value.to_string())
    }
}

/// Split a command argument string on whitespace while keeping quoted
/// segments intact. Quotes are stripped from the returned tokens.
pub fn split_quoted(args: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in args.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Canonicalise a path that may not exist yet.
///
/// `canonicalize` fails on paths without an inode (e.g. `save` targets),
/// so resolve the nearest existing ancestor and re-append the remainder,
/// normalising `.` / `..` components lexically on the way.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut existing = absolute.clone();
    let mut remainder: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                remainder.push(name.to_os_string());
                existing.pop();
            }
            None => break,
        }
    }

    let mut resolved = std::fs::canonicalize(&existing).unwrap_or(existing);
    for part in remainder.into_iter().rev() {
        resolved.push(part);
    }

    // Lexical cleanup for any `..` / `.` left in the non-existing tail.
    let mut cleaned = PathBuf::new();
    for comp in resolved.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Enforce the sandbox: the candidate path must be the sandbox directory
/// itself or live strictly inside it.
///
/// Both sides are canonicalised first, so `..` traversals and symlink
/// escapes are caught, and the component-wise prefix test rejects sibling
/// prefixes (`/data` does not admit `/data2`).
pub fn check_path_sandbox(path: &str, sandbox_dir: Option<&Path>) -> Result<()> {
    let Some(sandbox) = sandbox_dir else {
        return Ok(());
    };
    let candidate = canonicalize_lenient(Path::new(path));
    let sandbox = canonicalize_lenient(sandbox);
    if candidate == sandbox || candidate.starts_with(&sandbox) {
        return Ok(());
    }
    Err(PplError::Permission(format!(
        "Access denied: '{path}' is outside the sandbox '{}'",
        sandbox.display()
    )))
}
