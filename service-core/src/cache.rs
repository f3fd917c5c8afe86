//! Process-local cache with a fixed time-to-live.
//!
//! Entries are not persisted and are not shared between instances. Expired
//! entries are dropped lazily on lookup, and by a linear scan when the cache is
//! full or when [`TtlCache::purge_expired`] is called.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        {
            let entry = self.entries.get(key)?;
            if now.saturating_duration_since(entry.inserted_at) < self.ttl {
                return Some(entry.value.clone());
            }
        }

        // The read guard must be released before removing.
        self.entries
            .remove_if(key, |_, e| now.saturating_duration_since(e.inserted_at) >= self.ttl);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn insert_at(&self, key: K, value: V, now: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.purge_expired_at(now);

            if self.entries.len() >= self.max_entries {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.inserted_at) < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().inserted_at)
            .map(|e| e.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[test]
    fn fresh_entries_are_returned() {
        let cache = TtlCache::new(TTL, 10);
        let now = Instant::now();
        cache.insert_at("a".to_string(), 1, now);

        assert_eq!(cache.get_at(&"a".to_string(), now + Duration::from_secs(299)), Some(1));
        assert_eq!(cache.get_at(&"b".to_string(), now), None);
    }

    #[test]
    fn expired_entries_miss_and_are_removed() {
        let cache = TtlCache::new(TTL, 10);
        let now = Instant::now();
        cache.insert_at("a".to_string(), 1, now);

        assert_eq!(cache.get_at(&"a".to_string(), now + TTL), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn reinsert_refreshes_timestamp() {
        let cache = TtlCache::new(TTL, 10);
        let now = Instant::now();
        cache.insert_at("a".to_string(), 1, now);
        cache.insert_at("a".to_string(), 2, now + Duration::from_secs(200));

        assert_eq!(
            cache.get_at(&"a".to_string(), now + Duration::from_secs(400)),
            Some(2)
        );
    }

    #[test]
    fn full_cache_purges_expired_before_evicting() {
        let cache = TtlCache::new(TTL, 2);
        let now = Instant::now();
        cache.insert_at("old".to_string(), 1, now);
        cache.insert_at("mid".to_string(), 2, now + Duration::from_secs(100));

        // "old" has expired by now, so it is the one to go.
        let later = now + Duration::from_secs(350);
        cache.insert_at("new".to_string(), 3, later);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at(&"mid".to_string(), later), Some(2));
        assert_eq!(cache.get_at(&"new".to_string(), later), Some(3));
    }

    #[test]
    fn full_cache_evicts_oldest_live_entry() {
        let cache = TtlCache::new(TTL, 2);
        let now = Instant::now();
        cache.insert_at("first".to_string(), 1, now);
        cache.insert_at("second".to_string(), 2, now + Duration::from_secs(1));
        cache.insert_at("third".to_string(), 3, now + Duration::from_secs(2));

        let at = now + Duration::from_secs(3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at(&"first".to_string(), at), None);
        assert_eq!(cache.get_at(&"third".to_string(), at), Some(3));
    }

    #[test]
    fn purge_expired_counts_removed() {
        let cache = TtlCache::new(TTL, 10);
        let now = Instant::now();
        cache.insert_at(1u32, "x", now);
        cache.insert_at(2u32, "y", now + Duration::from_secs(250));

        assert_eq!(cache.purge_expired_at(now + Duration::from_secs(301)), 1);
        assert_eq!(cache.len(), 1);
    }
}
