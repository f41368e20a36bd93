use std::path::{Component, Path, PathBuf};

use fsal_core::FsalError;

/// Lexically normalizes a `/`-separated relative path: resolves `.`
/// segments, collapses repeated separators, and rejects any `..` segment
/// (the catalog invariant that `path` never contains `..`).
pub fn normalize_relative(rel: &str) -> Result<String, FsalError> {
    let trimmed = rel.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        return Ok(".".to_string());
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(FsalError::InvalidPath(format!(
                    "path escapes base with '..': {rel}"
                )));
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        Ok(".".to_string())
    } else {
        Ok(segments.join("/"))
    }
}

/// Validates a path supplied by a client against the anchor base path
/// (`base[0]`): trims whitespace/separators, joins with the anchor,
/// lexically normalizes, and requires the result to stay within the anchor.
/// Returns the normalized relative path on success.
pub fn validate_internal(raw: &str, anchor: &Path) -> Result<String, FsalError> {
    if raw.trim().is_empty() {
        return Err(FsalError::InvalidPath("path is empty".to_string()));
    }

    let rel = normalize_relative(raw)?;
    let joined = if rel == "." {
        anchor.to_path_buf()
    } else {
        anchor.join(&rel)
    };

    let normalized = lexically_normalize(&joined);
    if !normalized.starts_with(anchor) {
        return Err(FsalError::InvalidPath(format!(
            "path escapes base: {raw}"
        )));
    }

    Ok(rel)
}

/// Validates a client-supplied path that is allowed to live outside every
/// configured base (transfer sources). Accepts any absolute path and
/// returns its lexically normalized absolute form.
pub fn validate_external(raw: &str) -> Result<PathBuf, FsalError> {
    if raw.trim().is_empty() {
        return Err(FsalError::InvalidPath("path is empty".to_string()));
    }
    let path = Path::new(raw.trim());
    if !path.is_absolute() {
        return Err(FsalError::InvalidPath(format!(
            "external path must be absolute: {raw}"
        )));
    }
    Ok(lexically_normalize(path))
}

/// Resolves `.`/`..` components without touching the filesystem (the path
/// may not exist yet, e.g. a transfer destination).
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
