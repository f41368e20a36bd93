use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use fsal_bundles::BundleConfig;
use fsal_core::{BasePaths, ChangeEvent, EntryType, FsEntry, ROOT_ID};
use fsal_events::EventQueue;
use fsal_pathutil::Blacklist;
use fsal_store::Store;
use fsal_walker::WalkerConfig;
use tokio_stream::StreamExt;

use crate::fifo_cache::FifoCache;

/// Tuning knobs for one indexer instance, distinct from the per-daemon
/// [`fsal_core`] configuration so tests can build a minimal one directly.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub walker: WalkerConfig,
    pub bundle: BundleConfig,
    /// Row ids batched per `DELETE ... WHERE id IN (...)` during prune.
    pub prune_batch_size: usize,
    /// Capacity of the per-walk directory-path → id cache (spec §3, 1024).
    pub fifo_capacity: usize,
}

impl IndexerConfig {
    pub fn new(bundle: BundleConfig) -> Self {
        Self {
            walker: WalkerConfig::default(),
            bundle,
            prune_batch_size: 1000,
            fifo_capacity: 1024,
        }
    }
}

/// The walk/diff/upsert and prune engine (components C7 and, via
/// [`crate::notify`], C10). This is the logic the outer [`crate::Indexer`]
/// facade schedules through [`fsal_scheduler::Scheduler`] so callers never
/// block on it; tests that need deterministic completion call these methods
/// directly.
pub struct IndexerCore {
    store: Arc<Store>,
    bases: BasePaths,
    blacklist: Blacklist,
    events: Arc<EventQueue>,
    config: IndexerConfig,
}

impl IndexerCore {
    pub fn new(
        store: Arc<Store>,
        bases: BasePaths,
        blacklist: Blacklist,
        events: Arc<EventQueue>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            bases,
            blacklist,
            events,
            config,
        }
    }

    pub fn bases(&self) -> &BasePaths {
        &self.bases
    }

    pub fn bundle_config(&self) -> &BundleConfig {
        &self.config.bundle
    }

    /// Refresh (full): prune → extract-bundles → update, matching spec
    /// §4.7's mandated order.
    pub async fn refresh(&self) -> Vec<ChangeEvent> {
        let mut events = self.prune(None, None).await;
        self.extract_bundles().await;
        events.extend(self.update(None, ".").await);
        events
    }

    /// Streams every catalog row and drops any whose base is no longer
    /// configured, whose relative path is blacklisted, or whose file no
    /// longer exists on disk. `src_path` and `only_base` narrow the scope
    /// without changing the criteria.
    pub async fn prune(&self, src_path: Option<&str>, only_base: Option<&str>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        let mut pending_ids: Vec<i64> = Vec::new();
        let mut stream = self.store.select_all();

        while let Some(row) = stream.next().await {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(error = %err, "prune: failed to read a catalog row, skipping");
                    continue;
                }
            };

            if let Some(base) = only_base {
                if row.base_path != base {
                    continue;
                }
            }
            if let Some(prefix) = src_path {
                if prefix != "." && row.path != prefix && !row.path.starts_with(&format!("{prefix}/")) {
                    continue;
                }
            }

            let missing_on_disk = !Path::new(&row.base_path).join(&row.path).exists();
            let should_drop = !self.bases.contains(Path::new(&row.base_path))
                || self.blacklist.is_blacklisted(&row.path)
                || missing_on_disk;
            if !should_drop {
                continue;
            }

            events.push(ChangeEvent::deleted(row.path.clone(), row.entry_type.is_dir()));
            pending_ids.push(row.id);
            if pending_ids.len() >= self.config.prune_batch_size {
                self.flush_deletes(&mut pending_ids).await;
            }
        }
        // Flush whatever remains; the source's `len(removed_paths) >= 0`
        // check was vacuous, so this unconditional flush is the intended
        // behavior (spec §9 Open Questions).
        self.flush_deletes(&mut pending_ids).await;

        self.events.add_batch(events.clone()).await;
        events
    }

    async fn flush_deletes(&self, pending_ids: &mut Vec<i64>) {
        if pending_ids.is_empty() {
            return;
        }
        if let Err(err) = self.store.delete_where_id_in(pending_ids).await {
            tracing::error!(error = %err, "prune: batch delete failed");
        }
        pending_ids.clear();
    }

    /// Walks each base's configured bundle subdirectory, extracting and
    /// then deleting every recognized archive. Returns the total number of
    /// member files extracted across all bases (used by tests and logging;
    /// the indexed tree itself is picked up by the next `update` pass).
    pub async fn extract_bundles(&self) -> usize {
        let mut total = 0;
        for base in self.bases.iter() {
            let bundles_root = base.join(&self.config.bundle.bundles_dir);
            if tokio::fs::metadata(&bundles_root).await.is_err() {
                continue;
            }

            let base_owned = base.to_path_buf();
            let bundle_cfg = self.config.bundle.clone();
            let mut stream = fsal_walker::walk(
                bundles_root,
                move |path: &Path, is_dir: bool| {
                    if is_dir {
                        return true;
                    }
                    path.strip_prefix(&base_owned)
                        .ok()
                        .map(|rel| bundle_cfg.matches_location(&to_unix(rel)))
                        .unwrap_or(false)
                },
                self.config.walker,
            );

            while let Some(entry) = stream.next().await {
                if entry.is_dir {
                    continue;
                }
                let outcome = fsal_bundles::extract(&entry.path, base);
                if outcome.ok {
                    total += outcome.extracted_rel_paths.len();
                    if let Err(err) = tokio::fs::remove_file(&entry.path).await {
                        tracing::warn!(path = %entry.path.display(), error = %err, "failed to remove extracted bundle archive");
                    }
                }
            }
        }
        total
    }

    /// Walks the given bases (or all of them, if `bases` is `None`) rooted
    /// at `src_path` (`"."` for the whole base), diffing every encountered
    /// entry against the catalog and upserting. Returns the Created/
    /// Modified events generated, in walk order.
    pub async fn update(&self, bases: Option<&[String]>, src_path: &str) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for base in self.bases.iter() {
            let base_str = to_unix_path(base);
            if let Some(scope) = bases {
                if !scope.iter().any(|b| b == &base_str) {
                    continue;
                }
            }

            let root = if src_path == "." {
                base.to_path_buf()
            } else {
                base.join(src_path)
            };
            if tokio::fs::metadata(&root).await.is_err() {
                // Vanished between scheduling and running; prune will
                // remove the stale row on the next pass.
                continue;
            }

            let mut cache = FifoCache::with_capacity(self.config.fifo_capacity);
            let base_owned = base.to_path_buf();
            let blacklist = self.blacklist.clone();
            let all_bases: Vec<PathBuf> = self.bases.as_slice().to_vec();

            let mut stream = fsal_walker::walk(
                root,
                move |path: &Path, _is_dir: bool| {
                    if all_bases.iter().any(|b| b.as_path() == path) {
                        return false;
                    }
                    match path.strip_prefix(&base_owned) {
                        Ok(rel) => !blacklist.is_blacklisted(&to_unix(rel)),
                        Err(_) => false,
                    }
                },
                self.config.walker,
            );

            while let Some(entry) = stream.next().await {
                let Ok(rel) = entry.path.strip_prefix(base) else {
                    continue;
                };
                let rel_path = to_unix(rel);
                let parent_rel = match rel_path.rsplit_once('/') {
                    Some((parent, _)) => parent.to_string(),
                    None => ".".to_string(),
                };
                let parent_id = self.resolve_parent_id(&base_str, &parent_rel, &mut cache).await;

                let (create_time, modify_time) = entry_times(&entry.metadata);
                let candidate = FsEntry {
                    id: 0,
                    parent_id,
                    entry_type: if entry.is_dir { EntryType::Dir } else { EntryType::File },
                    name: entry.file_name.clone(),
                    size: if entry.is_dir { 0 } else { entry.metadata.len() },
                    create_time,
                    modify_time,
                    path: rel_path.clone(),
                    base_path: base_str.clone(),
                };

                match self.store.select_where_path_eq(&[base_str.clone()], &rel_path).await {
                    Ok(None) => {
                        events.push(ChangeEvent::created(rel_path.clone(), entry.is_dir));
                        match self.store.insert(&candidate).await {
                            Ok(id) => {
                                if entry.is_dir {
                                    cache.put(rel_path.clone(), id);
                                }
                            }
                            Err(err) => {
                                tracing::error!(path = %rel_path, error = %err, "update: insert failed");
                            }
                        }
                    }
                    Ok(Some(old)) => {
                        if old.changed(&candidate) {
                            events.push(ChangeEvent::modified(rel_path.clone(), entry.is_dir));
                            if let Err(err) = self.store.update(old.id, &candidate).await {
                                tracing::error!(path = %rel_path, error = %err, "update: row update failed");
                            }
                        }
                        if entry.is_dir {
                            cache.put(rel_path.clone(), old.id);
                        }
                    }
                    Err(err) => {
                        tracing::error!(path = %rel_path, error = %err, "update: lookup failed");
                    }
                }
            }
        }

        self.events.add_batch(events.clone()).await;
        events
    }

    async fn resolve_parent_id(&self, base_str: &str, parent_rel: &str, cache: &mut FifoCache) -> i64 {
        if parent_rel == "." {
            return ROOT_ID;
        }
        if let Some(id) = cache.get(parent_rel) {
            return id;
        }
        match self
            .store
            .select_where_path_eq(&[base_str.to_string()], parent_rel)
            .await
        {
            Ok(Some(row)) => {
                cache.put(parent_rel.to_string(), row.id);
                row.id
            }
            _ => ROOT_ID,
        }
    }

    /// Walks `rel` upward from a specific base, one segment at a time,
    /// returning the first ancestor present in the catalog (or `.`).
    pub async fn deepest_indexed_parent(&self, base_str: &str, rel: &str) -> String {
        if rel == "." || rel.is_empty() {
            return ".".to_string();
        }
        let mut candidate = rel.to_string();
        loop {
            if let Ok(Some(_)) = self
                .store
                .select_where_path_eq(&[base_str.to_string()], &candidate)
                .await
            {
                return candidate;
            }
            match candidate.rsplit_once('/') {
                Some((parent, _)) if !parent.is_empty() => candidate = parent.to_string(),
                _ => return ".".to_string(),
            }
        }
    }
}

fn to_unix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn to_unix_path(path: &Path) -> String {
    to_unix(path)
}

fn entry_times(meta: &std::fs::Metadata) -> (i64, i64) {
    let modify_time = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    #[cfg(unix)]
    let create_time = {
        use std::os::unix::fs::MetadataExt;
        meta.ctime()
    };
    #[cfg(not(unix))]
    let create_time = meta
        .created()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(modify_time);

    (create_time, modify_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config() -> IndexerConfig {
        IndexerConfig::new(BundleConfig::new("bundles", ["zip"]))
    }

    async fn core_over(root: &Path) -> IndexerCore {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let bases = BasePaths::new([root.to_path_buf()], None).unwrap();
        IndexerCore::new(store, bases, Blacklist::empty(), Arc::new(EventQueue::new()), config())
    }

    #[tokio::test]
    async fn update_discovers_a_fresh_tree() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        std::fs::write(dir.path().join("d/b.txt"), b"hello").unwrap();

        let core = core_over(dir.path()).await;
        let events = core.update(None, ".").await;
        assert_eq!(events.len(), 3);

        let base_str = to_unix_path(dir.path());
        let found = core
            .store
            .select_where_path_eq(&[base_str], "d/b.txt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.size, 5);
        assert!(found.parent_id > 0);
    }

    #[tokio::test]
    async fn second_update_with_no_changes_emits_no_events() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();

        let core = core_over(dir.path()).await;
        core.update(None, ".").await;
        let second = core.update(None, ".").await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn update_detects_a_size_change_as_modified() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"abc").unwrap();

        let core = core_over(dir.path()).await;
        core.update(None, ".").await;

        std::fs::write(&file, b"abcdef").unwrap();
        let events = core.update(None, ".").await;
        assert_eq!(events, vec![ChangeEvent::FileModified("a.txt".to_string())]);
    }

    #[tokio::test]
    async fn prune_drops_rows_for_files_deleted_on_disk() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"abc").unwrap();

        let core = core_over(dir.path()).await;
        core.update(None, ".").await;

        std::fs::remove_file(&file).unwrap();
        let events = core.prune(None, None).await;
        assert_eq!(events, vec![ChangeEvent::FileDeleted("a.txt".to_string())]);

        let base_str = to_unix_path(dir.path());
        assert!(core
            .store
            .select_where_path_eq(&[base_str], "a.txt")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn prune_drops_blacklisted_rows_even_if_still_on_disk() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("secret.env"), b"x").unwrap();

        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let bases = BasePaths::new([dir.path().to_path_buf()], None).unwrap();
        let blacklist = Blacklist::compile(["^secret\\."]).unwrap();
        let core = IndexerCore::new(store, bases, Blacklist::empty(), Arc::new(EventQueue::new()), config());
        core.update(None, ".").await;

        let core = IndexerCore::new(
            Arc::clone(&core.store),
            core.bases.clone(),
            blacklist,
            Arc::clone(&core.events),
            config(),
        );
        let events = core.prune(None, None).await;
        assert_eq!(events, vec![ChangeEvent::FileDeleted("secret.env".to_string())]);
    }

    #[tokio::test]
    async fn refresh_extracts_bundles_then_indexes_their_contents() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("bundles")).unwrap();
        let bundle_path = dir.path().join("bundles/pkg.zip");
        let file = std::fs::File::create(&bundle_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        use std::io::Write;
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("payload.txt", options).unwrap();
        writer.write_all(b"contents").unwrap();
        writer.finish().unwrap();

        let core = core_over(dir.path()).await;
        core.refresh().await;

        assert!(!bundle_path.exists());
        let base_str = to_unix_path(dir.path());
        let found = core
            .store
            .select_where_path_eq(&[base_str], "bundles/payload.txt")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn deepest_indexed_parent_walks_up_to_an_indexed_ancestor() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("d/e")).unwrap();
        std::fs::write(dir.path().join("d/e/f.txt"), b"x").unwrap();

        let core = core_over(dir.path()).await;
        core.update(None, ".").await;
        std::fs::remove_dir_all(dir.path().join("d/e")).unwrap();
        std::fs::create_dir(dir.path().join("d/e")).unwrap();

        let base_str = to_unix_path(dir.path());
        let deepest = core.deepest_indexed_parent(&base_str, "d/e/g.txt").await;
        assert_eq!(deepest, "d");
    }
}
