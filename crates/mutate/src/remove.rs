use std::path::{Path, PathBuf};
use std::sync::Arc;

use fsal_core::{ChangeEvent, FsalError};
use fsal_events::EventQueue;
use fsal_indexer::Indexer;
use fsal_store::Store;
use fsal_walker::WalkerConfig;
use tokio_stream::StreamExt;

/// `REMOVE(path)`: deletes a tree (or a single file) from disk and from the
/// catalog, publishing deletion events for everything it removed.
///
/// On any failure partway through, the partial state is reconciled by
/// scheduling a full refresh rather than trying to undo what already
/// happened — disk and catalog mutations here are not transactional across
/// each other, so a refresh is the only way back to a consistent view.
pub async fn remove(
    store: &Store,
    events: &Arc<EventQueue>,
    indexer: &Indexer,
    walker_config: WalkerConfig,
    path: &str,
) -> Result<(), FsalError> {
    let row = store
        .select_where_path_eq(&bases_of(indexer), path)
        .await?
        .ok_or_else(|| FsalError::NotFound(path.to_string()))?;

    let base_abs = PathBuf::from(&row.base_path);
    let target_abs = base_abs.join(&row.path);

    let outcome = do_remove(store, &base_abs, &target_abs, &row.path, row.entry_type.is_dir(), walker_config).await;

    match outcome {
        Ok(collected) => {
            events.add_batch(collected).await;
            Ok(())
        }
        Err(err) => {
            tracing::error!(path, error = %err, "remove failed partway through, scheduling a full refresh to reconcile");
            indexer.refresh();
            Err(err)
        }
    }
}

fn bases_of(indexer: &Indexer) -> Vec<String> {
    indexer
        .core()
        .bases()
        .iter()
        .map(|b| b.to_string_lossy().into_owned())
        .collect()
}

async fn do_remove(
    store: &Store,
    base_abs: &Path,
    target_abs: &Path,
    rel_path: &str,
    is_dir: bool,
    walker_config: WalkerConfig,
) -> Result<Vec<ChangeEvent>, FsalError> {
    let mut events = Vec::new();

    if is_dir {
        let mut descendants: Vec<(String, bool)> = Vec::new();
        let mut stream = fsal_walker::walk(target_abs.to_path_buf(), |_p: &Path, _d: bool| true, walker_config);
        while let Some(entry) = stream.next().await {
            if entry.path == target_abs {
                // The removed directory itself is reported separately below,
                // after its contents, so skip the walker's root entry here.
                continue;
            }
            if let Ok(rel) = entry.path.strip_prefix(base_abs) {
                descendants.push((rel.to_string_lossy().replace('\\', "/"), entry.is_dir));
            }
        }
        // Children before parents: sort by descending path depth so a
        // directory's contents are always reported deleted before it is.
        descendants.sort_by(|a, b| depth(&b.0).cmp(&depth(&a.0)));
        for (rel, dir) in &descendants {
            events.push(ChangeEvent::deleted(rel.clone(), *dir));
        }
        events.push(ChangeEvent::deleted(rel_path.to_string(), true));

        tokio::fs::remove_dir_all(target_abs)
            .await
            .map_err(|e| FsalError::io(target_abs.to_path_buf(), e))?;

        let base_str = base_abs.to_string_lossy().into_owned();
        let like_pattern = format!("{}/%", fsal_store::escape_like(rel_path));
        store.delete_where_path_like(&base_str, &like_pattern).await?;
        store.delete_where_path_equals(&base_str, rel_path).await?;
    } else {
        tokio::fs::remove_file(target_abs)
            .await
            .map_err(|e| FsalError::io(target_abs.to_path_buf(), e))?;
        let base_str = base_abs.to_string_lossy().into_owned();
        store.delete_where_path_equals(&base_str, rel_path).await?;
        events.push(ChangeEvent::deleted(rel_path.to_string(), false));
    }

    Ok(events)
}

fn depth(rel: &str) -> usize {
    rel.matches('/').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsal_bundles::BundleConfig;
    use fsal_core::{BasePaths, EntryType, FsEntry};
    use fsal_events::EventQueue;
    use fsal_indexer::IndexerConfig;
    use fsal_pathutil::Blacklist;
    use fsal_scheduler::Scheduler;
    use tempfile::tempdir;

    async fn setup(root: &Path) -> (Arc<Store>, Indexer) {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let bases = BasePaths::new([root.to_path_buf()], None).unwrap();
        let events = Arc::new(EventQueue::new());
        let (scheduler, _join) = Scheduler::spawn();
        let indexer = Indexer::new(
            Arc::clone(&store),
            bases,
            Blacklist::empty(),
            Arc::clone(&events),
            IndexerConfig::new(BundleConfig::new("bundles", ["zip"])),
            scheduler,
        );
        (store, indexer)
    }

    #[tokio::test]
    async fn remove_deletes_a_file_from_disk_and_catalog() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        let (store, indexer) = setup(dir.path()).await;
        indexer.core().update(None, ".").await;

        let events = Arc::new(EventQueue::new());
        remove(&store, &events, &indexer, WalkerConfig::default(), "a.txt")
            .await
            .unwrap();

        assert!(!dir.path().join("a.txt").exists());
        let bases = [dir.path().to_string_lossy().into_owned()];
        assert!(store.select_where_path_eq(&bases, "a.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_deletes_a_directory_tree_children_before_parent() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        std::fs::write(dir.path().join("d/a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("d/b.txt"), b"y").unwrap();
        let (store, indexer) = setup(dir.path()).await;
        indexer.core().update(None, ".").await;

        let events = Arc::new(EventQueue::new());
        remove(&store, &events, &indexer, WalkerConfig::default(), "d")
            .await
            .unwrap();

        assert!(!dir.path().join("d").exists());
        let published = events.peek(10).await;
        assert_eq!(published.len(), 3);
        assert_eq!(published.last().unwrap(), &ChangeEvent::DirDeleted("d".to_string()));

        let bases = [dir.path().to_string_lossy().into_owned()];
        assert!(store.select_where_path_eq(&bases, "d").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_of_unknown_path_is_not_found() {
        let dir = tempdir().unwrap();
        let (store, indexer) = setup(dir.path()).await;
        let events = Arc::new(EventQueue::new());
        let err = remove(&store, &events, &indexer, WalkerConfig::default(), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, FsalError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_schedules_a_refresh_on_disk_failure() {
        // Row exists in the catalog but the underlying file is already
        // gone — the disk removal step fails and a refresh reconciles it.
        let dir = tempdir().unwrap();
        let (store, indexer) = setup(dir.path()).await;
        store
            .insert(&FsEntry {
                id: 0,
                parent_id: 0,
                entry_type: EntryType::File,
                name: "ghost.txt".to_string(),
                size: 0,
                create_time: 1,
                modify_time: 1,
                path: "ghost.txt".to_string(),
                base_path: dir.path().to_string_lossy().into_owned(),
            })
            .await
            .unwrap();

        let events = Arc::new(EventQueue::new());
        let err = remove(&store, &events, &indexer, WalkerConfig::default(), "ghost.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, FsalError::Io { .. }));
    }
}
