//! The external notification source's callback contract (spec §1, §6): "an
//! external listener invokes a supplied callback with a batch where each
//! item has a `path` key." We do not ship a native inotify/FSEvents
//! backend — only the trait a real one would implement, plus a no-op stub
//! used when none is wired up (the daemon is fully usable via `REFRESH`/
//! `REFRESH_PATH` without any notification source at all).

use fsal_indexer::Notification;

/// Implemented by an external change-notification backend. `poll` is
/// expected to block (on its own thread/task) until a batch is ready, or
/// return `None` once the source has shut down.
#[async_trait::async_trait]
pub trait NotificationSource: Send + Sync {
    async fn next_batch(&mut self) -> Option<Vec<Notification>>;
}

/// A source that never produces a notification. The default when no
/// backend is configured; `REFRESH`/`REFRESH_PATH` remain the only way
/// changes get picked up.
pub struct NoopSource;

#[async_trait::async_trait]
impl NotificationSource for NoopSource {
    async fn next_batch(&mut self) -> Option<Vec<Notification>> {
        std::future::pending().await
    }
}

/// Drains `source` for as long as it produces batches, handing each one to
/// `manager.handle_notifications`. Runs until the source signals shutdown
/// (`None`) or the process is torn down (its task is aborted on drop).
pub async fn run_notification_loop(
    manager: fsal_manager::FsDbManager,
    mut source: impl NotificationSource,
) {
    while let Some(batch) = source.next_batch().await {
        manager.handle_notifications(batch).await;
    }
    tracing::info!("notification source closed, incremental updates now rely solely on REFRESH");
}
