//! Shared test fixtures: a small directory-tree builder so per-crate tests
//! don't each re-derive their own `std::fs::create_dir_all`/`write`
//! boilerplate for setting up a base path to index.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory populated via [`TempTree::file`]/[`TempTree::dir`],
/// kept alive for as long as the `TempTree` is (the underlying `TempDir` is
/// removed on drop).
pub struct TempTree {
    dir: TempDir,
}

impl TempTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir for test fixture"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` at `rel` (creating parent directories as needed)
    /// and returns `self` for chaining.
    pub fn file(self, rel: &str, contents: impl AsRef<[u8]>) -> Self {
        let full = self.dir.path().join(rel);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir for fixture file");
        }
        std::fs::write(&full, contents).expect("failed to write fixture file");
        self
    }

    /// Creates an empty directory at `rel` and returns `self` for chaining.
    pub fn dir(self, rel: &str) -> Self {
        std::fs::create_dir_all(self.dir.path().join(rel)).expect("failed to create fixture dir");
        self
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }
}

impl Default for TempTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_files_and_dirs() {
        let tree = TempTree::new().file("a.txt", b"abc").dir("d").file("d/b.txt", b"hello");

        assert_eq!(std::fs::read(tree.join("a.txt")).unwrap(), b"abc");
        assert!(tree.join("d").is_dir());
        assert_eq!(std::fs::read(tree.join("d/b.txt")).unwrap(), b"hello");
    }
}
