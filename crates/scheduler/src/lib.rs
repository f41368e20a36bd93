//! Single-worker serialized task queue (component C5).
//!
//! The indexer's async entry points (`refresh`, `prune`, `update`) and the
//! mutation engine's recovery refresh submit jobs here instead of running
//! them inline, so overlapping index work is coalesced into one serial
//! stream and callers never block on a long walk. A job that panics or
//! returns is logged; the worker keeps draining the queue regardless.

use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

/// A handle to the scheduler's single background worker. Cloning shares the
/// same worker and submission channel.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<Job>,
}

impl Scheduler {
    /// Spawns the worker task and returns a handle plus its `JoinHandle` (for
    /// callers that want to await a clean shutdown after dropping all
    /// handles).
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if AssertUnwindSafe(job()).catch_unwind().await.is_err() {
                    tracing::error!("scheduled job panicked, continuing");
                }
            }
        });
        (Self { tx }, worker)
    }

    /// Submits a job. Non-blocking: the job runs serially after every job
    /// submitted before it, once the worker reaches it.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() -> BoxFuture<'static, ()> + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            tracing::error!("scheduler worker is gone, dropping submitted job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let (scheduler, _worker) = Scheduler::spawn();
        let log = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = Arc::clone(&log);
            scheduler.submit(move || {
                Box::pin(async move {
                    log.lock().await.push(i);
                })
            });
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*log.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn a_panicking_job_does_not_stop_the_worker() {
        let (scheduler, _worker) = Scheduler::spawn();
        let ran = Arc::new(AtomicUsize::new(0));

        scheduler.submit(|| Box::pin(async { panic!("boom") }));

        let ran2 = Arc::clone(&ran);
        scheduler.submit(move || {
            Box::pin(async move {
                ran2.fetch_add(1, Ordering::SeqCst);
            })
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
