//! Bounded concurrent cache over moka.

use moka::sync::Cache;

/// Thread-safe concurrent map without a capacity bound.
///
/// Holds the runs the session already knows to be finished
/// (`MemCache<RunId, ()>`). Entries stay until removed; nothing is evicted.
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.entries.insert(key, value);
    }

    pub fn contains(
        &self,
        key: &K,
    ) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(
        &self,
        key: &K,
    ) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_contains_remove() {
        let cache: MemCache<String, u32> = MemCache::new();
        cache.set("a".to_string(), 1);
        assert!(cache.contains(&"a".to_string()));

        cache.remove(&"a".to_string());
        assert!(!cache.contains(&"a".to_string()));
    }

    #[test]
    fn test_no_eviction() {
        let cache: MemCache<u32, ()> = MemCache::new();
        for i in 0..20_000 {
            cache.set(i, ());
        }
        cache.entries.run_pending_tasks();
        assert!((0..20_000).all(|i| cache.contains(&i)));
    }
}
