//! Bounded FIFO of catalog [`ChangeEvent`]s (component C4).
//!
//! Multi-producer, multi-consumer: concurrent writers are serialized by the
//! internal mutex, and `peek`/`remove` give clients a confirm-then-drop
//! consumption model (`GET_CHANGES`/`CONFIRM_CHANGES`).

use std::collections::VecDeque;

use fsal_core::ChangeEvent;
use tokio::sync::Mutex;

/// Default capacity matching the FIFO cache budget used elsewhere in the
/// daemon; overridable via [`EventQueue::with_capacity`].
pub const DEFAULT_CAPACITY: usize = 4096;

pub struct EventQueue {
    inner: Mutex<VecDeque<ChangeEvent>>,
    capacity: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Appends a single event, dropping the oldest entry if the queue is at
    /// capacity (a runaway index job must not grow the daemon's memory
    /// without bound).
    pub async fn add(&self, event: ChangeEvent) {
        let mut guard = self.inner.lock().await;
        if guard.len() >= self.capacity {
            guard.pop_front();
            tracing::warn!("event queue at capacity, dropping oldest event");
        }
        guard.push_back(event);
    }

    /// Appends a batch of events in order, preserving the walk order they
    /// were produced in.
    pub async fn add_batch(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        let mut guard = self.inner.lock().await;
        for event in events {
            if guard.len() >= self.capacity {
                guard.pop_front();
                tracing::warn!("event queue at capacity, dropping oldest event");
            }
            guard.push_back(event);
        }
    }

    /// Returns up to `limit` oldest events without removing them.
    pub async fn peek(&self, limit: usize) -> Vec<ChangeEvent> {
        let guard = self.inner.lock().await;
        guard.iter().take(limit).cloned().collect()
    }

    /// Drops up to `limit` oldest events.
    pub async fn remove(&self, limit: usize) {
        let mut guard = self.inner.lock().await;
        for _ in 0..limit.min(guard.len()) {
            guard.pop_front();
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
