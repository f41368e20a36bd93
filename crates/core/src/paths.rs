use std::path::{Path, PathBuf};

use crate::FsalError;

/// The ordered, non-empty list of configured base directories.
///
/// Index 0 is the anchor for path-confinement checks and the root-directory
/// stat; the last index is the default transfer destination. An optional
/// `chroot` suffix, if configured, is appended to every base at construction
/// time so the rest of the system never has to special-case it.
#[derive(Debug, Clone)]
pub struct BasePaths {
    bases: Vec<PathBuf>,
}

impl BasePaths {
    /// Builds the effective base-path list from configured absolute
    /// directories and an optional chroot suffix. Fails if the list is
    /// empty or any entry is not absolute.
    pub fn new(
        configured: impl IntoIterator<Item = PathBuf>,
        chroot: Option<&Path>,
    ) -> Result<Self, FsalError> {
        let bases: Vec<PathBuf> = configured
            .into_iter()
            .map(|base| match chroot {
                Some(suffix) => base.join(suffix),
                None => base,
            })
            .collect();

        if bases.is_empty() {
            return Err(FsalError::InvalidPath(
                "fsal.basepaths must contain at least one directory".to_string(),
            ));
        }
        for base in &bases {
            if !base.is_absolute() {
                return Err(FsalError::InvalidPath(format!(
                    "base path {} is not absolute",
                    base.display()
                )));
            }
        }
        Ok(Self { bases })
    }

    /// The anchor base (index 0): used for path-confinement checks and the
    /// root-directory stat.
    pub fn anchor(&self) -> &Path {
        &self.bases[0]
    }

    /// The default transfer destination (last configured base).
    pub fn default_transfer_dest(&self) -> &Path {
        &self.bases[self.bases.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.bases.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, base: &Path) -> bool {
        self.bases.iter().any(|b| b == base)
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.bases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_list() {
        let err = BasePaths::new(Vec::new(), None).unwrap_err();
        assert!(matches!(err, FsalError::InvalidPath(_)));
    }

    #[test]
    fn rejects_relative_base() {
        let err = BasePaths::new([PathBuf::from("relative")], None).unwrap_err();
        assert!(matches!(err, FsalError::InvalidPath(_)));
    }

    #[test]
    fn anchor_is_first_and_default_dest_is_last() {
        let bases = BasePaths::new(
            [PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")],
            None,
        )
        .unwrap();
        assert_eq!(bases.anchor(), Path::new("/a"));
        assert_eq!(bases.default_transfer_dest(), Path::new("/c"));
        assert_eq!(bases.len(), 3);
    }

    #[test]
    fn chroot_suffix_is_appended_to_every_base() {
        let bases = BasePaths::new(
            [PathBuf::from("/a"), PathBuf::from("/b")],
            Some(Path::new("data")),
        )
        .unwrap();
        assert_eq!(bases.anchor(), Path::new("/a/data"));
        assert_eq!(bases.default_transfer_dest(), Path::new("/b/data"));
    }
}
