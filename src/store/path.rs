//! Materialized path helpers.
//!
//! A path is a `/`-separated sequence of resource names with no leading or
//! trailing separator, e.g. `platform/network/prod`. The first segment names
//! the root group.

use crate::error::{Error, Result};

pub const SEPARATOR: char = '/';

const MAX_NAME_LEN: usize = 64;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

/// Validates a single group or workspace name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::invalid(format!(
            "name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(Error::invalid(format!(
            "name '{name}' can only contain lowercase letters, digits, hyphens, and underscores"
        )));
    }
    let is_special = |c: char| c == '-' || c == '_';
    if name.starts_with(is_special) || name.ends_with(is_special) {
        return Err(Error::invalid(format!(
            "name '{name}' cannot start or end with a hyphen or underscore"
        )));
    }
    Ok(())
}

/// Strictly validates a stored-form path.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::invalid("path cannot be empty"));
    }
    for segment in path.split(SEPARATOR) {
        validate_name(segment).map_err(|e| match e {
            Error::Invalid(msg) => Error::invalid(format!("invalid path '{path}': {msg}")),
            other => other,
        })?;
    }
    Ok(())
}

/// Normalizes user input into stored form: trims whitespace, drops leading,
/// trailing and repeated separators, then validates.
pub fn normalize_path(path: &str) -> Result<String> {
    let segments: Vec<&str> = path
        .trim()
        .split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(Error::invalid("path cannot be empty"));
    }

    let normalized = segments.join("/");
    validate_path(&normalized)?;
    Ok(normalized)
}

#[must_use]
pub fn join(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}{SEPARATOR}{name}"),
        None => name.to_string(),
    }
}

#[must_use]
pub fn root_segment(path: &str) -> &str {
    path.split(SEPARATOR).next().unwrap_or(path)
}

#[must_use]
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// Nesting level of a path; a root group is level 1.
#[must_use]
pub fn level(path: &str) -> usize {
    path.matches(SEPARATOR).count() + 1
}

/// True when `ancestor` equals `path` or is a strict prefix of it followed by
/// a separator. `a/b` is an ancestor of `a/b/c` but not of `a/bc`.
#[must_use]
pub fn is_ancestor_or_equal(ancestor: &str, path: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// Escapes LIKE wildcards so the term matches literally with `ESCAPE '\'`.
#[must_use]
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
