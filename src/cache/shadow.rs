//! Generic read-mostly key/value cache.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

/// A thread-safe map with explicit invalidation.
///
/// Many readers proceed concurrently; writers are serialized. Critical
/// sections are map operations only. Two concurrent misses on the same key
/// may both populate it; the last write wins, which is harmless because both
/// values come from the store at the same point in time.
#[derive(Debug)]
pub struct ShadowCache<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for ShadowCache<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ShadowCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, or `None` on a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.read().get(key).cloned()
    }

    /// Insert or replace the value for `key`.
    pub fn set(&self, key: K, value: V) {
        self.inner.write().insert(key, value);
    }

    /// Drop the entry for `key`. Returns whether an entry was present.
    pub fn clear<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.write().remove(key).is_some()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_then_get_round_trips() {
        let cache: ShadowCache<String, u32> = ShadowCache::new();
        assert_eq!(cache.get("a"), None);

        cache.set("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));

        cache.set("a".to_string(), 2);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_turns_hit_into_miss() {
        let cache: ShadowCache<String, u32> = ShadowCache::new();
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);

        assert!(cache.clear("a"));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert!(!cache.clear("a"));
    }

    #[test]
    fn empty_value_is_distinct_from_miss() {
        let cache: ShadowCache<String, Arc<Vec<u32>>> = ShadowCache::new();
        cache.set("p".to_string(), Arc::new(Vec::new()));

        let hit = cache.get("p");
        assert!(hit.is_some());
        assert!(hit.unwrap().is_empty());
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache: Arc<ShadowCache<String, usize>> = Arc::new(ShadowCache::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("k{}", i % 16);
                        if cache.get(&key).is_none() {
                            // Racing misses write the same value for a key.
                            cache.set(key.clone(), i % 16);
                        }
                        if t == 0 && i % 50 == 0 {
                            cache.clear(&key);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..16 {
            if let Some(v) = cache.get(&format!("k{i}")) {
                assert_eq!(v, i);
            }
        }
    }
}
