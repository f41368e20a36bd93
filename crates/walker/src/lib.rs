//! Lazy, cooperative depth-first directory walker (component C3).
//!
//! The walker never follows symlinks. After each directory is fully read it
//! yields to other tasks sharing the runtime, and every
//! [`WalkerConfig::cooperative_yield_every`] directories it additionally
//! sleeps for [`WalkerConfig::tick_interval`] so a long walk cannot starve
//! request handlers. Errors reading a directory or stat-ing an entry are
//! logged and end the walk at that point; callers never see a panic or a
//! partial-result error.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Tuning knobs for the cooperative yield cadence (§9 "N≈32").
#[derive(Debug, Clone, Copy)]
pub struct WalkerConfig {
    pub cooperative_yield_every: u32,
    pub tick_interval: std::time::Duration,
    pub channel_capacity: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            cooperative_yield_every: 32,
            tick_interval: std::time::Duration::from_millis(500),
            channel_capacity: 256,
        }
    }
}

/// One filesystem object encountered during a walk, together with its stat.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub metadata: Metadata,
    pub is_dir: bool,
}

/// Decides whether an entry is yielded to the caller, and (for directories)
/// whether the walker descends into it. Called once per entry encountered.
pub trait WalkFilter: Send + Sync + 'static {
    fn accept(&self, path: &Path, is_dir: bool) -> bool;
}

impl<F> WalkFilter for F
where
    F: Fn(&Path, bool) -> bool + Send + Sync + 'static,
{
    fn accept(&self, path: &Path, is_dir: bool) -> bool {
        self(path, is_dir)
    }
}

/// Walks `root` depth-first (LIFO frontier), yielding entries that pass
/// `filter`. Only directories that pass `filter` are descended into.
pub fn walk(
    root: impl Into<PathBuf>,
    filter: impl WalkFilter,
    config: WalkerConfig,
) -> ReceiverStream<WalkEntry> {
    let root = root.into();
    let (tx, rx) = mpsc::channel(config.channel_capacity);

    tokio::spawn(async move {
        run_walk(root, &filter, config, &tx).await;
    });

    ReceiverStream::new(rx)
}

async fn run_walk(
    root: PathBuf,
    filter: &impl WalkFilter,
    config: WalkerConfig,
    tx: &mpsc::Sender<WalkEntry>,
) {
    let root_metadata = match tokio::fs::symlink_metadata(&root).await {
        Ok(meta) => meta,
        Err(err) => {
            tracing::warn!(path = %root.display(), error = %err, "walk: failed to stat root, stopping walk");
            return;
        }
    };

    let mut frontier: Vec<PathBuf> = Vec::new();
    if !root_metadata.file_type().is_symlink() {
        let root_is_dir = root_metadata.is_dir();
        if filter.accept(&root, root_is_dir) {
            let file_name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if tx
                .send(WalkEntry {
                    path: root.clone(),
                    file_name,
                    metadata: root_metadata,
                    is_dir: root_is_dir,
                })
                .await
                .is_err()
            {
                return;
            }
        }
        if root_is_dir {
            frontier.push(root);
        }
    }

    let mut directories_processed: u32 = 0;

    while let Some(dir) = frontier.pop() {
        let read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(err) => {
                tracing::warn!(path = %dir.display(), error = %err, "walk: failed to read directory, stopping walk");
                return;
            }
        };
        let mut read_dir = read_dir;

        loop {
            let next = match read_dir.next_entry().await {
                Ok(next) => next,
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "walk: failed to read directory entry, stopping walk");
                    return;
                }
            };
            let Some(entry) = next else { break };

            let path = entry.path();
            let metadata = match tokio::fs::symlink_metadata(&path).await {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "walk: failed to stat entry, skipping");
                    continue;
                }
            };

            if metadata.file_type().is_symlink() {
                continue;
            }

            let is_dir = metadata.is_dir();
            if !filter.accept(&path, is_dir) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            if tx
                .send(WalkEntry {
                    path: path.clone(),
                    file_name,
                    metadata,
                    is_dir,
                })
                .await
                .is_err()
            {
                return;
            }

            if is_dir {
                frontier.push(path);
            }
        }

        directories_processed += 1;
        tokio::task::yield_now().await;
        if config.cooperative_yield_every > 0
            && directories_processed % config.cooperative_yield_every == 0
        {
            tokio::time::sleep(config.tick_interval).await;
        }
    }
}
