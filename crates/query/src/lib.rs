//! Catalog query surface (component C8): `list_dir`, `list_descendants`,
//! `search`, `filter`, `exists`, `is_dir`/`is_file`, `get_fso`, and
//! `get_path_size`.
//!
//! Reads are not scheduled through the task scheduler (spec §5): every
//! method here runs directly on the caller's task and streams results back
//! without materializing the full result set in memory, per spec §9's
//! lazy-stream invariant.

mod descendants;
mod whitelist_guard;

pub use descendants::{DescendantQuery, DescendantsResult};
pub use whitelist_guard::SharedWhitelist;

use std::path::{Path, PathBuf};

use fsal_core::{BasePaths, FsEntry, FsalError};
use fsal_store::{SearchQuery, Store};
use fsal_walker::WalkerConfig;
use std::sync::Arc;
use tokio_stream::StreamExt;

/// The read-only query facade (C8). Holds shared references to the store,
/// the configured base paths, and the mutable whitelist (mutated only by
/// `SET_WHITELIST`, per spec §5).
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<Store>,
    bases: BasePaths,
    whitelist: SharedWhitelist,
    walker_config: WalkerConfig,
}

impl QueryEngine {
    pub fn new(store: Arc<Store>, bases: BasePaths, whitelist: SharedWhitelist) -> Self {
        Self {
            store,
            bases,
            whitelist,
            walker_config: WalkerConfig::default(),
        }
    }

    fn base_strs(&self) -> Vec<String> {
        self.bases.iter().map(|b| b.to_string_lossy().into_owned()).collect()
    }

    /// `GET_FSO(path)`: the single matching row (first base, in configured
    /// order, that has it), or the synthetic root for `.`.
    pub async fn get_fso(&self, path: &str) -> Result<Option<FsEntry>, FsalError> {
        if path == "." {
            return Ok(Some(FsEntry::synthetic_root(self.bases.anchor().to_string_lossy().into_owned())));
        }
        self.store.select_where_path_eq(&self.base_strs(), path).await
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool, FsalError> {
        Ok(self.get_fso(path).await?.is_some_and(|e| e.entry_type.is_dir()))
    }

    pub async fn is_file(&self, path: &str) -> Result<bool, FsalError> {
        Ok(self.get_fso(path).await?.is_some_and(|e| !e.entry_type.is_dir()))
    }

    /// `EXISTS(path, unindexed)`. When `unindexed`, checks the disk
    /// directly under any configured base rather than consulting the
    /// catalog.
    pub async fn exists(&self, path: &str, unindexed: bool) -> Result<bool, FsalError> {
        if unindexed {
            return Ok(self.bases.iter().any(|base| base.join(path).exists()));
        }
        Ok(self.get_fso(path).await?.is_some())
    }

    /// `LIST_DIR(path)`: `ok=false` iff `path` is not a known directory;
    /// otherwise every row with `parent_id` equal to the directory's id
    /// (this naturally merges multiple bases' top-level entries under the
    /// synthetic root, since they all share `parent_id = 0`).
    pub async fn list_dir(&self, path: &str) -> Result<(bool, Vec<FsEntry>), FsalError> {
        match self.get_fso(path).await? {
            Some(dir) if dir.entry_type.is_dir() => {
                let children = self.store.select_children(dir.id).await?;
                Ok((true, children))
            }
            _ => Ok((false, Vec::new())),
        }
    }

    /// `LIST_DESCENDANTS(path, ...)`. See [`descendants::run`].
    pub async fn list_descendants(&self, query: DescendantQuery) -> Result<DescendantsResult, FsalError> {
        descendants::run(self, query).await
    }

    /// `SEARCH(query, whole_words, exclude)`. First tries `query` as an
    /// indexed directory path; if it resolves, returns that listing with
    /// `is_match=true`. Otherwise tokenizes on whitespace and matches rows
    /// whose name contains (or, if `whole_words`, equals) any token.
    pub async fn search(
        &self,
        query: &str,
        whole_words: bool,
        exclude: Vec<String>,
    ) -> Result<(bool, Vec<FsEntry>), FsalError> {
        if let (true, children) = self.list_dir(query).await? {
            return Ok((true, children));
        }

        let tokens: Vec<String> = query.split_whitespace().map(str::to_string).collect();
        if tokens.is_empty() {
            return Ok((false, Vec::new()));
        }

        let search = SearchQuery {
            bases: self.base_strs(),
            tokens,
            whole_words,
            exclude,
        };
        let mut stream = self.store.search(search);
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await {
            rows.push(row?);
        }
        Ok((false, rows))
    }

    /// `FILTER(paths)`: rows whose path is in `paths`, batched to
    /// [`fsal_store::MAX_BATCH`] per store query, across every base.
    pub async fn filter(&self, paths: Vec<String>) -> Result<Vec<FsEntry>, FsalError> {
        let mut rows = Vec::new();
        for base in self.base_strs() {
            let mut stream = self.store.select_paths_in(base, paths.clone());
            while let Some(row) = stream.next().await {
                rows.push(row?);
            }
        }
        Ok(rows)
    }

    /// `GET_PATH_SIZE(path)`: walks `abs_dir` with an accept-all predicate
    /// and sums the size of every file entry; `(false, 0)` if it isn't a
    /// directory.
    pub async fn get_path_size(&self, abs_dir: &Path) -> (bool, u64) {
        if !abs_dir.is_dir() {
            return (false, 0);
        }
        let mut stream = fsal_walker::walk(abs_dir.to_path_buf(), |_p: &Path, _is_dir: bool| true, self.walker_config);
        let mut total = 0u64;
        while let Some(entry) = stream.next().await {
            if !entry.is_dir {
                total += entry.metadata.len();
            }
        }
        (true, total)
    }

    pub fn whitelist(&self) -> &SharedWhitelist {
        &self.whitelist
    }

    pub fn bases(&self) -> &BasePaths {
        &self.bases
    }
}

/// Resolves the absolute directory a relative path names under the anchor
/// base, for callers (`GET_PATH_SIZE`) that need an absolute path to walk.
pub fn anchor_abs(bases: &BasePaths, rel: &str) -> PathBuf {
    if rel == "." {
        bases.anchor().to_path_buf()
    } else {
        bases.anchor().join(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsal_core::EntryType;
    use fsal_pathutil::Whitelist;
    use tempfile::tempdir;

    async fn store_with(entries: &[(&str, &str, EntryType, i64)]) -> (Store, BasePaths) {
        let store = Store::open_in_memory().await.unwrap();
        for (path, base, entry_type, parent_id) in entries {
            let name = path.rsplit('/').next().unwrap_or(path).to_string();
            store
                .insert(&FsEntry {
                    id: 0,
                    parent_id: *parent_id,
                    entry_type: *entry_type,
                    name,
                    size: if entry_type.is_dir() { 0 } else { 10 },
                    create_time: 1,
                    modify_time: 1,
                    path: path.to_string(),
                    base_path: base.to_string(),
                })
                .await
                .unwrap();
        }
        let bases = BasePaths::new([PathBuf::from("/tmp/r")], None).unwrap();
        (store, bases)
    }

    #[tokio::test]
    async fn get_fso_of_dot_is_the_synthetic_root() {
        let (store, bases) = store_with(&[]).await;
        let engine = QueryEngine::new(Arc::new(store), bases, SharedWhitelist::new(Whitelist::empty()));
        let root = engine.get_fso(".").await.unwrap().unwrap();
        assert!(root.is_root());
    }

    #[tokio::test]
    async fn list_dir_of_an_unknown_path_reports_not_ok() {
        let (store, bases) = store_with(&[]).await;
        let engine = QueryEngine::new(Arc::new(store), bases, SharedWhitelist::new(Whitelist::empty()));
        let (ok, rows) = engine.list_dir("missing").await.unwrap();
        assert!(!ok);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn search_prefers_an_exact_directory_match() {
        let (store, bases) = store_with(&[
            ("docs", "/tmp/r", EntryType::Dir, 0),
            ("docs/readme.txt", "/tmp/r", EntryType::File, 1),
        ])
        .await;
        let engine = QueryEngine::new(Arc::new(store), bases, SharedWhitelist::new(Whitelist::empty()));
        let (is_match, rows) = engine.search("docs", false, Vec::new()).await.unwrap();
        assert!(is_match);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "readme.txt");
    }

    #[tokio::test]
    async fn search_falls_back_to_token_matching() {
        let (store, bases) = store_with(&[
            ("readme.txt", "/tmp/r", EntryType::File, 0),
            ("readme.bak", "/tmp/r", EntryType::File, 0),
        ])
        .await;
        let engine = QueryEngine::new(Arc::new(store), bases, SharedWhitelist::new(Whitelist::empty()));
        let (is_match, rows) = engine
            .search("readme", false, vec!["readme.bak".to_string()])
            .await
            .unwrap();
        assert!(!is_match);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "readme.txt");
    }

    #[tokio::test]
    async fn exists_unindexed_checks_disk_not_catalog() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        let store = Store::open_in_memory().await.unwrap();
        let bases = BasePaths::new([dir.path().to_path_buf()], None).unwrap();
        let engine = QueryEngine::new(Arc::new(store), bases, SharedWhitelist::new(Whitelist::empty()));

        assert!(engine.exists("a.txt", true).await.unwrap());
        assert!(!engine.exists("a.txt", false).await.unwrap());
    }

    #[tokio::test]
    async fn get_path_size_sums_file_bytes_under_a_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        std::fs::write(dir.path().join("d/b.txt"), b"hello").unwrap();

        let store = Store::open_in_memory().await.unwrap();
        let bases = BasePaths::new([dir.path().to_path_buf()], None).unwrap();
        let engine = QueryEngine::new(Arc::new(store), bases, SharedWhitelist::new(Whitelist::empty()));

        let (ok, size) = engine.get_path_size(dir.path()).await;
        assert!(ok);
        assert_eq!(size, 8);
    }
}
