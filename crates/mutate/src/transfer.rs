use std::path::PathBuf;

use fsal_core::{BasePaths, FsalError};
use fsal_indexer::Indexer;
use fsal_store::Store;

use crate::fs_ops::{move_path, path_byte_len};

/// Spec's hard ceiling on a transfer destination's absolute path length.
const MAX_PATH_BYTES: usize = 32_767;

/// `TRANSFER(src, dest)`: moves an external absolute path into the last
/// configured base at relative `dest`, then schedules an incremental index
/// update rooted at the deepest already-indexed ancestor of the new path.
pub async fn transfer(
    store: &Store,
    bases: &BasePaths,
    indexer: &Indexer,
    src_raw: &str,
    dest_raw: &str,
) -> Result<(), FsalError> {
    let src_abs = fsal_pathutil::validate_external(src_raw)?;
    if !src_abs.exists() {
        return Err(FsalError::InvalidPath(format!(
            "transfer source does not exist: {}",
            src_abs.display()
        )));
    }
    if is_already_indexed(store, bases, &src_abs).await? {
        return Err(FsalError::InvalidPath(format!(
            "transfer source is already indexed: {}",
            src_abs.display()
        )));
    }

    let last_base = bases.default_transfer_dest().to_path_buf();
    let dest_rel = fsal_pathutil::validate_internal(dest_raw, &last_base)?;
    let dest_abs = if dest_rel == "." {
        last_base.clone()
    } else {
        last_base.join(&dest_rel)
    };

    let (target_abs, target_rel) = if dest_abs.is_dir() {
        let file_name = src_abs
            .file_name()
            .ok_or_else(|| FsalError::InvalidPath("transfer source has no file name".to_string()))?;
        let target_abs = dest_abs.join(file_name);
        let target_rel = if dest_rel == "." {
            file_name.to_string_lossy().into_owned()
        } else {
            format!("{dest_rel}/{}", file_name.to_string_lossy())
        };
        (target_abs, target_rel)
    } else {
        (dest_abs, dest_rel)
    };

    if target_abs.exists() {
        return Err(FsalError::AlreadyExists(target_abs));
    }

    check_path_lengths(&src_abs, &target_abs).await?;

    move_path(&src_abs, &target_abs).await?;

    let last_base_str = last_base.to_string_lossy().into_owned();
    let deepest = indexer.core().deepest_indexed_parent(&last_base_str, &target_rel).await;
    indexer.schedule_update(Some(vec![last_base_str]), deepest);

    Ok(())
}

async fn is_already_indexed(store: &Store, bases: &BasePaths, src_abs: &std::path::Path) -> Result<bool, FsalError> {
    for base in bases.iter() {
        if let Ok(rel) = src_abs.strip_prefix(base) {
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let rel_str = if rel_str.is_empty() { ".".to_string() } else { rel_str };
            let base_str = base.to_string_lossy().into_owned();
            if store
                .select_where_path_eq(&[base_str], &rel_str)
                .await?
                .is_some()
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Rejects the transfer if the source is a file whose destination path
/// would exceed [`MAX_PATH_BYTES`], or (for a directory source) if any
/// member's resulting destination path would.
async fn check_path_lengths(src_abs: &std::path::Path, target_abs: &std::path::Path) -> Result<(), FsalError> {
    if path_byte_len(target_abs) > MAX_PATH_BYTES {
        return Err(too_long(target_abs));
    }

    if !src_abs.is_dir() {
        return Ok(());
    }

    let mut frontier: Vec<PathBuf> = vec![src_abs.to_path_buf()];
    while let Some(dir) = frontier.pop() {
        let mut read_dir = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| FsalError::io(dir.clone(), e))?;
        while let Some(child) = read_dir
            .next_entry()
            .await
            .map_err(|e| FsalError::io(dir.clone(), e))?
        {
            let child_path = child.path();
            let rel = child_path.strip_prefix(src_abs).unwrap_or(&child_path);
            let candidate = target_abs.join(rel);
            if path_byte_len(&candidate) > MAX_PATH_BYTES {
                return Err(too_long(&candidate));
            }
            let file_type = child
                .file_type()
                .await
                .map_err(|e| FsalError::io(child_path.clone(), e))?;
            if file_type.is_dir() {
                frontier.push(child_path);
            }
        }
    }
    Ok(())
}

fn too_long(path: &std::path::Path) -> FsalError {
    let as_string = path.to_string_lossy().into_owned();
    FsalError::PathTooLong {
        len: as_string.len(),
        path: as_string,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsal_bundles::BundleConfig;
    use fsal_events::EventQueue;
    use fsal_indexer::IndexerConfig;
    use fsal_pathutil::Blacklist;
    use fsal_scheduler::Scheduler;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn setup(dest_root: &std::path::Path) -> (Arc<Store>, BasePaths, Indexer) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let bases = BasePaths::new([dest_root.to_path_buf()], None).unwrap();
        let (scheduler, _join) = Scheduler::spawn();
        let indexer = Indexer::new(
            Arc::clone(&store),
            bases.clone(),
            Blacklist::empty(),
            Arc::new(EventQueue::new()),
            IndexerConfig::new(BundleConfig::new("bundles", ["zip"])),
            scheduler,
        );
        (store, bases, indexer)
    }

    #[tokio::test]
    async fn transfer_moves_a_file_into_the_base() {
        let src_dir = tempdir().unwrap();
        let src_file = src_dir.path().join("a.txt");
        std::fs::write(&src_file, b"hello").unwrap();

        let dest_dir = tempdir().unwrap();
        let (store, bases, indexer) = setup(dest_dir.path()).await;

        transfer(&store, &bases, &indexer, &src_file.to_string_lossy(), "a.txt")
            .await
            .unwrap();

        assert!(!src_file.exists());
        assert!(dest_dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn transfer_into_an_existing_directory_uses_basename() {
        let src_dir = tempdir().unwrap();
        let src_file = src_dir.path().join("a.txt");
        std::fs::write(&src_file, b"hello").unwrap();

        let dest_dir = tempdir().unwrap();
        std::fs::create_dir(dest_dir.path().join("sub")).unwrap();
        let (store, bases, indexer) = setup(dest_dir.path()).await;

        transfer(&store, &bases, &indexer, &src_file.to_string_lossy(), "sub")
            .await
            .unwrap();

        assert!(dest_dir.path().join("sub/a.txt").exists());
    }

    #[tokio::test]
    async fn transfer_rejects_an_existing_destination() {
        let src_dir = tempdir().unwrap();
        let src_file = src_dir.path().join("a.txt");
        std::fs::write(&src_file, b"hello").unwrap();

        let dest_dir = tempdir().unwrap();
        std::fs::write(dest_dir.path().join("a.txt"), b"existing").unwrap();
        let (store, bases, indexer) = setup(dest_dir.path()).await;

        let err = transfer(&store, &bases, &indexer, &src_file.to_string_lossy(), "a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, FsalError::AlreadyExists(_)));
        assert!(src_file.exists());
    }

    #[tokio::test]
    async fn transfer_rejects_a_nonexistent_source() {
        let dest_dir = tempdir().unwrap();
        let (store, bases, indexer) = setup(dest_dir.path()).await;

        let err = transfer(&store, &bases, &indexer, "/no/such/file", "a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, FsalError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn transfer_rejects_a_source_already_indexed_under_a_base() {
        let dest_dir = tempdir().unwrap();
        let already = dest_dir.path().join("already.txt");
        std::fs::write(&already, b"x").unwrap();
        let (store, bases, indexer) = setup(dest_dir.path()).await;
        indexer.core().update(None, ".").await;

        let err = transfer(&store, &bases, &indexer, &already.to_string_lossy(), "dest.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, FsalError::InvalidPath(_)));
    }
}
