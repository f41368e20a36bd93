use std::path::{Path, PathBuf};

use fsal_core::FsalError;
use fsal_indexer::Indexer;
use fsal_store::Store;
use tokio_stream::StreamExt;

use crate::fs_ops::copy_recursive;

/// Result of a `CONSOLIDATE(sources, dest)` call.
#[derive(Debug, Clone)]
pub struct ConsolidateOutcome {
    pub success: bool,
    /// True iff at least one file copied successfully AND at least one
    /// source failed — a mixed outcome the caller should surface as such
    /// rather than as a clean success or a clean failure.
    pub is_partial: bool,
    pub message: Option<String>,
}

/// Merge-copies every source tree into `dest`, re-homes the catalog rows
/// for whatever was actually copied, and schedules follow-up prune/update
/// jobs so the catalog converges with the new layout.
pub async fn consolidate(store: &Store, indexer: &Indexer, sources: Vec<String>, dest: String) -> ConsolidateOutcome {
    let dest_abs = match fsal_pathutil::validate_external(&dest) {
        Ok(p) => p,
        Err(err) => {
            return ConsolidateOutcome {
                success: false,
                is_partial: false,
                message: Some(err.to_string()),
            }
        }
    };

    let mut had_error = false;
    let mut any_copied = false;
    let mut copied_by_source: Vec<(PathBuf, Vec<String>)> = Vec::new();

    for source in &sources {
        let source_abs = match fsal_pathutil::validate_external(source) {
            Ok(p) => p,
            Err(err) => {
                tracing::error!(source, error = %err, "consolidate: invalid source path");
                had_error = true;
                continue;
            }
        };
        if !source_abs.is_dir() {
            tracing::error!(source = %source_abs.display(), "consolidate: source is not a directory");
            had_error = true;
            continue;
        }

        match copy_merge(&source_abs, &dest_abs).await {
            Ok(copied) => {
                if !copied.is_empty() {
                    any_copied = true;
                }
                copied_by_source.push((source_abs, copied));
            }
            Err(err) => {
                tracing::error!(source = %source_abs.display(), error = %err, "consolidate: copy failed");
                had_error = true;
            }
        }
    }

    for (source_abs, rel_paths) in &copied_by_source {
        for rel in rel_paths {
            let path = source_abs.join(rel);
            if let Err(err) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %err, "consolidate: failed to remove copied source file");
            }
        }
    }

    let dest_str = dest_abs.to_string_lossy().into_owned();
    for (source_abs, rel_paths) in &copied_by_source {
        if rel_paths.is_empty() {
            continue;
        }
        let source_str = source_abs.to_string_lossy().into_owned();
        if let Err(err) = store
            .bulk_update_base_path(vec![source_str.clone()], dest_str.clone(), rel_paths.clone())
            .await
        {
            tracing::error!(error = %err, "consolidate: catalog base-path fixup failed");
            had_error = true;
        }
        for rel in rel_paths {
            indexer.schedule_prune(rel.clone(), source_str.clone());
            indexer.schedule_update(Some(vec![dest_str.clone()]), rel.clone());
        }
    }

    ConsolidateOutcome {
        success: any_copied || !had_error,
        is_partial: any_copied && had_error,
        message: had_error.then(|| "one or more sources failed to consolidate".to_string()),
    }
}

/// Recursively copies every file under `source` onto `dest` (directory
/// structure mirrored, existing files overwritten), returning the relative
/// paths of files that copied successfully. A single file's failure is
/// logged and skipped rather than aborting the whole source.
async fn copy_merge(source: &Path, dest: &Path) -> Result<Vec<String>, FsalError> {
    let mut copied = Vec::new();
    let mut frontier: Vec<PathBuf> = vec![source.to_path_buf()];

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
            let file_type = child
                .file_type()
                .await
                .map_err(|e| FsalError::io(child_path.clone(), e))?;
            let rel = child_path
                .strip_prefix(source)
                .unwrap_or(&child_path)
                .to_string_lossy()
                .replace('\\', "/");

            if file_type.is_dir() {
                frontier.push(child_path);
                continue;
            }

            let target = dest.join(&rel);
            match copy_recursive(&child_path, &target).await {
                Ok(()) => copied.push(rel),
                Err(err) => {
                    tracing::error!(path = %child_path.display(), error = %err, "consolidate: failed to copy one file, continuing");
                }
            }
        }
    }

    Ok(copied)
}
