use std::sync::Arc;

use fsal_pathutil::Whitelist;
use tokio::sync::RwLock;

/// The whitelist reference shared between the query engine and
/// `SET_WHITELIST`'s handler. Spec §5: "mutated only via SET_WHITELIST;
/// atomic replacement of the list reference" — modeled here as a whole-list
/// swap behind a `RwLock` rather than in-place mutation, so readers never
/// observe a partially-updated list.
#[derive(Clone)]
pub struct SharedWhitelist {
    inner: Arc<RwLock<Whitelist>>,
}

impl SharedWhitelist {
    pub fn new(initial: Whitelist) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn replace(&self, whitelist: Whitelist) {
        *self.inner.write().await = whitelist;
    }

    pub async fn snapshot(&self) -> Whitelist {
        self.inner.read().await.clone()
    }
}
