use std::collections::{HashMap, VecDeque};

/// Bounded directory relative-path → row id mapping used while walking a
/// base so the indexer doesn't re-query the store for a parent id it has
/// already resolved earlier in the same walk. Eviction: oldest insertion is
/// dropped once the cache is at capacity (spec §3, capacity 1024).
pub struct FifoCache {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashMap<String, i64>,
}

impl FifoCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            ids: HashMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, rel_path: &str) -> Option<i64> {
        self.ids.get(rel_path).copied()
    }

    pub fn put(&mut self, rel_path: String, id: i64) {
        if self.ids.contains_key(&rel_path) {
            self.ids.insert(rel_path, id);
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(rel_path.clone());
        self.ids.insert(rel_path, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_for_an_unknown_path() {
        let cache = FifoCache::with_capacity(4);
        assert_eq!(cache.get("d"), None);
    }

    #[test]
    fn get_after_put_round_trips() {
        let mut cache = FifoCache::with_capacity(4);
        cache.put("d".to_string(), 7);
        assert_eq!(cache.get("d"), Some(7));
    }

    #[test]
    fn evicts_oldest_insertion_once_full() {
        let mut cache = FifoCache::with_capacity(2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("c".to_string(), 3);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn updating_an_existing_key_does_not_evict() {
        let mut cache = FifoCache::with_capacity(2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("a".to_string(), 11);

        assert_eq!(cache.get("a"), Some(11));
        assert_eq!(cache.get("b"), Some(2));
    }
}
