//! `FSDBManager`: the facade composing the catalog store (C2), indexer
//! (C7/C10), query engine (C8), and mutation engine (C9) behind the single
//! API the protocol server (C11) dispatches requests into.
//!
//! Constructing a [`FsDbManager`] wires up every collaborator in the order
//! spec §5 assumes: the store actor and the scheduler's worker are each
//! spawned once and shared by `Arc`/`Clone`, giving the single-writer
//! discipline for catalog mutations "for free by construction" rather than
//! by locking discipline (`SPEC_FULL.md` §5).

mod config;

pub use config::{ManagerConfig, StoreLocation};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fsal_bundles::BundleConfig;
use fsal_core::{BasePaths, ChangeEvent, FsEntry, FsalError};
use fsal_events::EventQueue;
use fsal_indexer::{Indexer, IndexerConfig, Notification};
use fsal_mutate::{ConsolidateOutcome, MutationEngine};
use fsal_pathutil::{Blacklist, Whitelist};
use fsal_query::{DescendantQuery, DescendantsResult, QueryEngine, SharedWhitelist};
use fsal_scheduler::Scheduler;
use fsal_store::{EntryStream, Store};
use tokio::task::JoinHandle;

/// The facade type every protocol command dispatches through.
#[derive(Clone)]
pub struct FsDbManager {
    store: Arc<Store>,
    bases: BasePaths,
    events: Arc<EventQueue>,
    indexer: Indexer,
    query: QueryEngine,
    mutate: MutationEngine,
    whitelist: SharedWhitelist,
}

impl FsDbManager {
    /// Opens the catalog store, compiles the blacklist, and wires up the
    /// scheduler/indexer/query/mutate stack. Returns the manager plus the
    /// scheduler worker's `JoinHandle` (callers hold it to observe a clean
    /// shutdown once every `FsDbManager` clone is dropped).
    pub async fn open(config: ManagerConfig) -> Result<(Self, JoinHandle<()>), FsalError> {
        let bases = BasePaths::new(config.base_paths, config.chroot.as_deref())?;
        let blacklist = Blacklist::compile(&config.blacklist_patterns)?;
        let whitelist = SharedWhitelist::new(Whitelist::new(config.whitelist_prefixes));

        let store = Arc::new(match &config.store {
            StoreLocation::File(path) => Store::open(path).await?,
            StoreLocation::InMemory => Store::open_in_memory().await?,
        });
        let events = Arc::new(EventQueue::with_capacity(config.events_capacity));
        let (scheduler, join_handle) = Scheduler::spawn();

        let bundle = BundleConfig::new(config.bundles_dir, config.bundles_exts);
        let indexer_config = IndexerConfig {
            walker: config.walker,
            bundle,
            prune_batch_size: config.prune_batch_size,
            fifo_capacity: config.fifo_capacity,
        };
        let indexer = Indexer::new(
            Arc::clone(&store),
            bases.clone(),
            blacklist,
            Arc::clone(&events),
            indexer_config,
            scheduler,
        );

        let query = QueryEngine::new(Arc::clone(&store), bases.clone(), whitelist.clone());
        let mutate = MutationEngine::new(Arc::clone(&store), bases.clone(), Arc::clone(&events), indexer.clone());

        Ok((
            Self {
                store,
                bases,
                events,
                indexer,
                query,
                mutate,
                whitelist,
            },
            join_handle,
        ))
    }

    fn anchor(&self) -> &Path {
        self.bases.anchor()
    }

    fn validate_internal(&self, raw: &str) -> Result<String, FsalError> {
        fsal_pathutil::validate_internal(raw, self.anchor())
    }

    // ---- C8: query engine ----------------------------------------------

    pub async fn list_dir(&self, path: &str) -> Result<(bool, Vec<FsEntry>), FsalError> {
        let rel = self.validate_internal(path)?;
        self.query.list_dir(&rel).await
    }

    pub async fn list_descendants(&self, mut query: DescendantQuery) -> Result<DescendantsResult, FsalError> {
        if query.path != "." {
            query.path = self.validate_internal(&query.path)?;
        }
        self.query.list_descendants(query).await
    }

    pub fn list_base_paths(&self) -> Vec<String> {
        self.bases.iter().map(|b| b.to_string_lossy().into_owned()).collect()
    }

    pub async fn exists(&self, path: &str, unindexed: bool) -> Result<bool, FsalError> {
        let rel = self.validate_internal(path)?;
        self.query.exists(&rel, unindexed).await
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool, FsalError> {
        let rel = self.validate_internal(path)?;
        self.query.is_dir(&rel).await
    }

    pub async fn is_file(&self, path: &str) -> Result<bool, FsalError> {
        let rel = self.validate_internal(path)?;
        self.query.is_file(&rel).await
    }

    pub async fn get_fso(&self, path: &str) -> Result<Option<FsEntry>, FsalError> {
        let rel = self.validate_internal(path)?;
        self.query.get_fso(&rel).await
    }

    pub async fn search(
        &self,
        query: &str,
        whole_words: bool,
        exclude: Vec<String>,
    ) -> Result<(bool, Vec<FsEntry>), FsalError> {
        self.query.search(query, whole_words, exclude).await
    }

    pub async fn filter(&self, paths: Vec<String>) -> Result<Vec<FsEntry>, FsalError> {
        self.query.filter(paths).await
    }

    /// `GET_PATH_SIZE(path)`: resolves `path` to an absolute directory
    /// (its indexed base if known, otherwise the anchor base) and sums
    /// file sizes under it.
    pub async fn get_path_size(&self, path: &str) -> Result<(bool, u64), FsalError> {
        let rel = self.validate_internal(path)?;
        let abs = match self.query.get_fso(&rel).await? {
            Some(entry) => PathBuf::from(&entry.base_path).join(&entry.path),
            None if rel == "." => self.anchor().to_path_buf(),
            None => self.anchor().join(&rel),
        };
        Ok(self.query.get_path_size(&abs).await)
    }

    // ---- C9: mutation engine --------------------------------------------

    pub async fn remove(&self, path: &str) -> Result<(), FsalError> {
        let rel = self.validate_internal(path)?;
        self.mutate.remove(&rel).await
    }

    pub async fn transfer(&self, src: &str, dest: &str) -> Result<(), FsalError> {
        self.mutate.transfer(src, dest).await
    }

    pub async fn consolidate(&self, sources: Vec<String>, dest: String) -> ConsolidateOutcome {
        self.mutate.consolidate(sources, dest).await
    }

    // ---- C4: change events ----------------------------------------------

    pub async fn get_changes(&self, limit: usize) -> Vec<ChangeEvent> {
        self.events.peek(limit).await
    }

    pub async fn confirm_changes(&self, limit: usize) {
        self.events.remove(limit).await;
    }

    // ---- C7: indexing -----------------------------------------------------

    /// `REFRESH`: acknowledges immediately, the scheduled job runs in the
    /// background (spec §4.10).
    pub fn refresh(&self) {
        self.indexer.refresh();
    }

    /// `REFRESH_PATH(path)`: validates synchronously, schedules the scoped
    /// prune+update job.
    pub fn refresh_path(&self, path: &str) -> Result<(), FsalError> {
        let rel = self.validate_internal(path)?;
        self.indexer.refresh_path(rel);
        Ok(())
    }

    // ---- C10: notifications ------------------------------------------------

    pub async fn handle_notifications(&self, notifications: Vec<Notification>) {
        self.indexer.handle_notifications(notifications).await;
    }

    // ---- C5: whitelist mutation --------------------------------------------

    /// `SET_WHITELIST(paths)`: atomic replacement of the whitelist
    /// reference (spec §5).
    pub async fn set_whitelist(&self, prefixes: Vec<String>) {
        self.whitelist.replace(Whitelist::new(prefixes)).await;
    }

    pub fn bases(&self) -> &BasePaths {
        &self.bases
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Direct streaming access for callers (tests) that want an
    /// [`EntryStream`] instead of a materialized `Vec`.
    pub fn select_all(&self) -> EntryStream {
        self.store.select_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_indexes_nothing_until_refresh_is_scheduled() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();

        let (manager, _join) = FsDbManager::open(ManagerConfig::single_base(dir.path())).await.unwrap();
        let (ok, children) = manager.list_dir(".").await.unwrap();
        assert!(ok);
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn refresh_path_rejects_an_escaping_path() {
        let dir = tempdir().unwrap();
        let (manager, _join) = FsDbManager::open(ManagerConfig::single_base(dir.path())).await.unwrap();
        let err = manager.refresh_path("../etc").unwrap_err();
        assert!(matches!(err, FsalError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn bootstrap_walk_then_query_round_trips() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        std::fs::write(dir.path().join("d/b.txt"), b"hello").unwrap();

        let (manager, _join) = FsDbManager::open(ManagerConfig::single_base(dir.path())).await.unwrap();
        manager.indexer.core().update(None, ".").await;

        let (ok, children) = manager.list_dir(".").await.unwrap();
        assert!(ok);
        let mut names: Vec<_> = children.iter().map(|e| e.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt".to_string(), "d".to_string()]);

        let found = manager.get_fso("d/b.txt").await.unwrap().unwrap();
        assert_eq!(found.size, 5);
    }

    #[tokio::test]
    async fn set_whitelist_restricts_list_descendants() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"y").unwrap();

        let (manager, _join) = FsDbManager::open(ManagerConfig::single_base(dir.path())).await.unwrap();
        manager.indexer.core().update(None, ".").await;
        manager.set_whitelist(vec!["docs".to_string()]).await;

        let result = manager.list_descendants(DescendantQuery::whole_tree()).await.unwrap();
        let DescendantsResult::Entries(mut stream) = result else {
            panic!("expected entries");
        };
        use tokio_stream::StreamExt;
        let mut names = Vec::new();
        while let Some(row) = stream.next().await {
            names.push(row.unwrap().name);
        }
        assert_eq!(names, vec!["a.txt".to_string()]);
    }
}
