//! Mutation engine (component C9): `remove`, `transfer`, and `consolidate`.
//!
//! Disk and catalog writes here are not transactional across each other —
//! each operation does its best to keep both in sync and falls back to
//! scheduling indexer work (a full refresh, or a scoped prune/update) to
//! reconcile whatever it could not fix up directly.

mod consolidate;
mod fs_ops;
mod remove;
mod transfer;

pub use consolidate::ConsolidateOutcome;

use std::sync::Arc;

use fsal_core::{BasePaths, FsalError};
use fsal_events::EventQueue;
use fsal_indexer::Indexer;
use fsal_store::Store;
use fsal_walker::WalkerConfig;

/// The mutation facade (C9), composing the store, the configured bases, the
/// change-event queue, and the indexer it schedules follow-up work through.
#[derive(Clone)]
pub struct MutationEngine {
    store: Arc<Store>,
    bases: BasePaths,
    events: Arc<EventQueue>,
    indexer: Indexer,
    walker_config: WalkerConfig,
}

impl MutationEngine {
    pub fn new(store: Arc<Store>, bases: BasePaths, events: Arc<EventQueue>, indexer: Indexer) -> Self {
        Self {
            store,
            bases,
            events,
            indexer,
            walker_config: WalkerConfig::default(),
        }
    }

    /// `REMOVE(path)`.
    pub async fn remove(&self, path: &str) -> Result<(), FsalError> {
        remove::remove(&self.store, &self.events, &self.indexer, self.walker_config, path).await
    }

    /// `TRANSFER(src, dest)`.
    pub async fn transfer(&self, src: &str, dest: &str) -> Result<(), FsalError> {
        transfer::transfer(&self.store, &self.bases, &self.indexer, src, dest).await
    }

    /// `CONSOLIDATE(sources, dest)`.
    pub async fn consolidate(&self, sources: Vec<String>, dest: String) -> ConsolidateOutcome {
        consolidate::consolidate(&self.store, &self.indexer, sources, dest).await
    }
}
