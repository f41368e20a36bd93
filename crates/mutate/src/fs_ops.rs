//! Disk-level move/copy/remove primitives shared by `transfer` and
//! `consolidate`. Kept free of catalog concerns: callers are responsible for
//! translating outcomes into rows and events.

use std::path::Path;

use fsal_core::FsalError;
use futures::future::BoxFuture;

/// Moves `src` to `dest`, falling back to a recursive copy-then-remove when
/// the two paths are on different filesystems (`rename` returns `EXDEV`).
pub async fn move_path(src: &Path, dest: &Path) -> Result<(), FsalError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FsalError::io(parent.to_path_buf(), e))?;
    }

    match tokio::fs::rename(src, dest).await {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            copy_recursive(src, dest).await?;
            remove_recursive(src).await
        }
        Err(err) => Err(FsalError::io(src.to_path_buf(), err)),
    }
}

fn is_cross_device(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

/// Recursively copies `src` onto `dest`, creating any missing directories.
/// Existing files at the destination are overwritten (merge semantics).
pub fn copy_recursive<'a>(src: &'a Path, dest: &'a Path) -> BoxFuture<'a, Result<(), FsalError>> {
    Box::pin(async move {
        let meta = tokio::fs::symlink_metadata(src)
            .await
            .map_err(|e| FsalError::io(src.to_path_buf(), e))?;

        if meta.is_dir() {
            tokio::fs::create_dir_all(dest)
                .await
                .map_err(|e| FsalError::io(dest.to_path_buf(), e))?;
            let mut read_dir = tokio::fs::read_dir(src)
                .await
                .map_err(|e| FsalError::io(src.to_path_buf(), e))?;
            while let Some(child) = read_dir
                .next_entry()
                .await
                .map_err(|e| FsalError::io(src.to_path_buf(), e))?
            {
                let child_dest = dest.join(child.file_name());
                copy_recursive(&child.path(), &child_dest).await?;
            }
            Ok(())
        } else {
            tokio::fs::copy(src, dest)
                .await
                .map(|_| ())
                .map_err(|e| FsalError::io(src.to_path_buf(), e))
        }
    })
}

/// Removes `path`, whether it is a file or a directory tree.
pub async fn remove_recursive(path: &Path) -> Result<(), FsalError> {
    let meta = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| FsalError::io(path.to_path_buf(), e))?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| FsalError::io(path.to_path_buf(), e))
    } else {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| FsalError::io(path.to_path_buf(), e))
    }
}

/// Approximate byte length of a path, used for the 32767-byte transfer
/// destination check. Not exact for non-UTF-8 components on all platforms,
/// which is acceptable since the limit itself is a coarse sanity bound.
pub fn path_byte_len(path: &Path) -> usize {
    path.as_os_str().to_string_lossy().len()
}
