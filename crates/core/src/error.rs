use std::path::PathBuf;

/// The error taxonomy shared across the workspace. Every crate's local error
/// type converts into this one at its boundary (store errors, protocol
/// parse errors, bundle errors, and so on), so the protocol server (C11) has
/// a single type to render into a `<error>` response.
#[derive(Debug, thiserror::Error)]
pub enum FsalError {
    /// Path validation failed: empty, escapes the confining base, or not
    /// whitelisted.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A catalog lookup missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// A transfer or consolidate destination is already occupied.
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// A transfer destination's absolute path exceeds the 32767-byte limit.
    #[error("path too long: {path} ({len} bytes)")]
    PathTooLong { path: String, len: usize },

    /// A bundle archive was malformed or contained a path that escapes the
    /// extraction target.
    #[error("bundle error: {0}")]
    Bundle(String),

    /// An underlying disk operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A catalog write failed.
    #[error("store error: {0}")]
    Store(String),

    /// A request document could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl FsalError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FsalError::Io {
            path: path.into(),
            source,
        }
    }
}
