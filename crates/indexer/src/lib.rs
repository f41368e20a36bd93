//! Prune, bundle-extraction, walk/diff/upsert, and notification handling
//! (components C7 and C10).
//!
//! The [`Indexer`] facade owns the [`fsal_scheduler::Scheduler`] and
//! exposes the async entry points spec §4.5 says are its sole consumer:
//! `refresh`, `refresh_path`, and the notification/mutation-driven
//! `schedule_update`/`schedule_prune`. Each submits a job to the single
//! worker so overlapping index work is serialized and callers never block
//! on a long walk. [`IndexerCore`] holds the actual logic and is exposed
//! directly for callers (tests, and the manager's synchronous
//! `REFRESH_PATH` validation path) that need a deterministic, awaited
//! result instead of a fire-and-forget job.

mod core;
mod fifo_cache;
mod notify;

pub use core::{IndexerConfig, IndexerCore};
pub use notify::Notification;

use std::sync::Arc;

use fsal_core::BasePaths;
use fsal_events::EventQueue;
use fsal_pathutil::Blacklist;
use fsal_scheduler::Scheduler;
use fsal_store::Store;

/// The scheduled-indexing facade. Cloning shares the same core and
/// scheduler handle.
#[derive(Clone)]
pub struct Indexer {
    core: Arc<IndexerCore>,
    scheduler: Scheduler,
}

impl Indexer {
    pub fn new(
        store: Arc<Store>,
        bases: BasePaths,
        blacklist: Blacklist,
        events: Arc<EventQueue>,
        config: IndexerConfig,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            core: Arc::new(IndexerCore::new(store, bases, blacklist, events, config)),
            scheduler,
        }
    }

    /// Direct access to the underlying logic, for synchronous/test callers
    /// and for other in-process components (the mutation engine) that need
    /// to submit their own follow-up jobs through the same scheduler.
    pub fn core(&self) -> &Arc<IndexerCore> {
        &self.core
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// `REFRESH`: schedules prune → extract-bundles → update. Returns
    /// immediately; per spec §4.10 this command acknowledges before the
    /// work completes.
    pub fn refresh(&self) {
        let core = Arc::clone(&self.core);
        self.scheduler.submit(move || Box::pin(async move { core.refresh().await; }));
    }

    /// `REFRESH_PATH`: schedules a prune and update scoped to `path` (bundle
    /// extraction is a whole-base concern and is left to full `refresh`).
    /// Unlike `REFRESH`, this is synchronous from the caller's perspective
    /// up to path validation; the actual indexing still runs as a scheduled
    /// job (decision recorded in DESIGN.md).
    pub fn refresh_path(&self, path: String) {
        let core = Arc::clone(&self.core);
        self.scheduler.submit(move || {
            Box::pin(async move {
                core.prune(Some(&path), None).await;
                core.update(None, &path).await;
            })
        });
    }

    /// Schedules a prune scoped to `src_path` within a single base (used by
    /// consolidate to prune copied source paths after a merge-copy).
    pub fn schedule_prune(&self, src_path: String, base: String) {
        let core = Arc::clone(&self.core);
        self.scheduler.submit(move || {
            Box::pin(async move {
                core.prune(Some(&src_path), Some(&base)).await;
            })
        });
    }

    /// Schedules an update rooted at `src_path`, optionally scoped to one
    /// base (transfer/consolidate/notification-driven incremental reindex).
    pub fn schedule_update(&self, bases: Option<Vec<String>>, src_path: String) {
        let core = Arc::clone(&self.core);
        self.scheduler.submit(move || {
            Box::pin(async move {
                core.update(bases.as_deref(), &src_path).await;
            })
        });
    }

    /// `C10`: handles a batch of external change notifications. Each item
    /// is resolved independently — a bundle match is extracted inline (it's
    /// cheap and its result determines what to reindex), then an update is
    /// scheduled rooted at the deepest already-indexed ancestor. Any failure
    /// for one notification is logged and does not stop the batch.
    pub async fn handle_notifications(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            self.handle_one(notification).await;
        }
    }

    async fn handle_one(&self, notification: Notification) {
        let bases = self.core.bases().as_slice().to_vec();
        for base in &bases {
            let Ok(rel) = fsal_pathutil::normalize_relative(&notification.path) else {
                continue;
            };
            if !base.join(&rel).exists() {
                continue;
            }
            let base_str = base.to_string_lossy().replace('\\', "/");
            let bundle = self.bundle_config_for(base);
            let resolved = notify::resolve_notified_path(base, &rel, &bundle);
            let deepest = self.core.deepest_indexed_parent(&base_str, &resolved).await;
            self.schedule_update(Some(vec![base_str]), deepest);
            return;
        }
        tracing::warn!(path = %notification.path, "notification path is not under any configured base");
    }

    fn bundle_config_for(&self, _base: &std::path::Path) -> fsal_bundles::BundleConfig {
        // One bundle configuration currently applies to every base (spec
        // §6: `bundles.bundles_dir`/`bundles.bundles_exts` are global keys).
        self.core.bundle_config().clone()
    }
}
