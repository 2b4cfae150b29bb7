//! Dataset ID and path validation, and log sanitizing.
//!
//! IDs are checked before any file path or object key is derived from them,
//! so a hostile ID can never address anything outside the store.

use crate::constants::{MAX_FILE_NAME_LENGTH, MAX_LOG_FIELD_LENGTH};
use crate::errors::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

static SAFE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static ID pattern is valid"));

static SAFE_FILE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("static file name pattern is valid"));

/// Validate a dataset ID against the charset, length and path-safety rules
pub fn validate_id(id: &str, max_length: usize) -> Result<()> {
    check_common(id, max_length, &SAFE_ID_PATTERN).map_err(|reason| Error::invalid_id(id, reason))
}

/// Validate a bare file name (no directories) before it is joined to a base
pub fn validate_file_name(name: &str) -> Result<()> {
    check_common(name, MAX_FILE_NAME_LENGTH, &SAFE_FILE_NAME_PATTERN)
        .map_err(|reason| Error::invalid_id(name, format!("invalid file name: {reason}")))
}

fn check_common(value: &str, max_length: usize, pattern: &Regex) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("cannot be empty".to_string());
    }
    if value.len() > max_length {
        return Err(format!("too long (max {max_length} characters)"));
    }
    if value.contains("..") {
        return Err("contains path traversal sequence".to_string());
    }
    if value.contains(['/', '\\']) {
        return Err("contains directory separators".to_string());
    }
    if value.contains('\0') {
        return Err("contains null bytes".to_string());
    }
    if !pattern.is_match(value) {
        return Err("contains invalid characters".to_string());
    }
    Ok(())
}

/// Join `file_name` onto `base_dir`, refusing any result that escapes it
pub fn validate_and_join_path(base_dir: &Path, file_name: &str) -> Result<PathBuf> {
    validate_file_name(file_name)?;

    let clean_base = normalize(base_dir);
    let full_path = normalize(&clean_base.join(file_name));

    let abs_base = absolute(&clean_base)?;
    let abs_full = absolute(&full_path)?;

    if abs_full == abs_base || !abs_full.starts_with(&abs_base) {
        return Err(Error::invalid_id(
            file_name,
            "path escapes base directory",
        ));
    }

    Ok(full_path)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::io(path, "resolve current directory", e))?;
    Ok(normalize(&cwd.join(path)))
}

// Lexical cleanup: drops `.` components and folds `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Escape control characters and cap the length of a value destined for logs
#[must_use]
pub fn sanitize_for_logging(input: &str) -> String {
    let escaped = input
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");

    if escaped.len() <= MAX_LOG_FIELD_LENGTH {
        return escaped;
    }

    let mut end = MAX_LOG_FIELD_LENGTH;
    while !escaped.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &escaped[..end])
}
