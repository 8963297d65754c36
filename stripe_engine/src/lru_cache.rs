//! A generic, bounded, insertion/use-ordered cache with byte accounting and
//! optional per-entry expiry.
//!
//! Backed by `indexmap::IndexMap`, already a dependency of the workspace and
//! the same "preserves order, O(1)-ish move-to-end" container family the
//! corpus reaches for when it needs an ordered map (see
//! `alpaca_rest::provider::fetch_bars`'s `IndexMap<String, Vec<AlpacaBar>>`).
//! Move-to-MRU is a `shift_remove` + reinsert, which is O(n) worst case in
//! `IndexMap` but the cache sizes this engine uses (tens of years, tens of
//! tiles) keep that cost negligible in practice.

use std::hash::Hash;
use std::time::Instant;

use indexmap::IndexMap;
use thiserror::Error;

/// Failure modes for [`LruCache::set`]. Everything else is infallible.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("size_bytes must be non-negative, got {0}")]
    InvalidArgument(i64),
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    size_bytes: u64,
    label: Option<String>,
    hit_count: u64,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

/// A point-in-time summary of cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub count: usize,
    pub total_bytes: u64,
    /// Labels of live entries, oldest (LRU) first.
    pub labels_oldest_to_newest: Vec<Option<String>>,
}

/// A generic bounded ordered map with byte accounting and optional
/// per-entry expiry. Eviction is strictly least-recently-used.
#[derive(Debug)]
pub struct LruCache<K, V> {
    entries: IndexMap<K, CacheEntry<V>>,
    capacity: usize,
    total_bytes: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
            total_bytes: 0,
        }
    }

    /// Returns the value for `key`, promoting it to most-recently-used and
    /// incrementing its hit count. An expired entry is treated as absent and
    /// removed on this first touch.
    pub fn get(&mut self, key: &K) -> Option<&V>
    where
        V: Clone,
    {
        self.get_at(key, Instant::now())
    }

    /// Same as [`Self::get`] but with an explicit "now", for deterministic
    /// expiry tests.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<&V> {
        if let Some(entry) = self.entries.get(key) {
            if Self::is_expired(entry, now) {
                self.remove_internal(key);
                return None;
            }
        } else {
            return None;
        }

        // Move to MRU (end of the map).
        let (k, mut entry) = self.entries.shift_remove_entry(key).expect("checked above");
        entry.hit_count += 1;
        self.entries.insert(k.clone(), entry);
        self.entries.get(&k).map(|e| &e.value)
    }

    pub fn has(&mut self, key: &K) -> bool {
        self.has_at(key, Instant::now())
    }

    pub fn has_at(&mut self, key: &K, now: Instant) -> bool {
        match self.entries.get(key) {
            None => false,
            Some(entry) if Self::is_expired(entry, now) => {
                self.remove_internal(key);
                false
            }
            Some(_) => true,
        }
    }

    /// Inserts or replaces `key`. On replace, `hit_count` is preserved and
    /// the entry is moved to MRU. Evicts from the front while `len() >
    /// capacity`.
    pub fn set(
        &mut self,
        key: K,
        value: V,
        size_bytes: i64,
        label: Option<String>,
        expires_at: Option<Instant>,
    ) -> Result<(), CacheError> {
        self.set_at(key, value, size_bytes, label, expires_at, Instant::now())
    }

    pub fn set_at(
        &mut self,
        key: K,
        value: V,
        size_bytes: i64,
        label: Option<String>,
        expires_at: Option<Instant>,
        now: Instant,
    ) -> Result<(), CacheError> {
        if size_bytes < 0 {
            return Err(CacheError::InvalidArgument(size_bytes));
        }
        let size_bytes = size_bytes as u64;

        let hit_count = if let Some((_, old)) = self.entries.shift_remove_entry(&key) {
            self.total_bytes -= old.size_bytes;
            old.hit_count
        } else {
            0
        };

        self.entries.insert(
            key,
            CacheEntry {
                value,
                size_bytes,
                label,
                hit_count,
                inserted_at: now,
                expires_at,
            },
        );
        self.total_bytes += size_bytes;

        while self.entries.len() > self.capacity {
            self.evict_lru();
        }

        Ok(())
    }

    pub fn delete(&mut self, key: &K) -> bool {
        self.remove_internal(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            count: self.entries.len(),
            total_bytes: self.total_bytes,
            labels_oldest_to_newest: self.entries.values().map(|e| e.label.clone()).collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn hit_count(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|e| e.hit_count)
    }

    #[cfg(test)]
    pub(crate) fn inserted_at(&self, key: &K) -> Option<Instant> {
        self.entries.get(key).map(|e| e.inserted_at)
    }

    fn is_expired(entry: &CacheEntry<V>, now: Instant) -> bool {
        entry.expires_at.is_some_and(|exp| now >= exp)
    }

    fn remove_internal(&mut self, key: &K) -> bool {
        if let Some((_, entry)) = self.entries.shift_remove_entry(key) {
            self.total_bytes -= entry.size_bytes;
            true
        } else {
            false
        }
    }

    fn evict_lru(&mut self) {
        if let Some((_, entry)) = self.entries.shift_remove_index(0) {
            self.total_bytes -= entry.size_bytes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn set_then_get_roundtrips() {
        let mut cache: LruCache<i32, &str> = LruCache::new(3);
        cache.set(1, "a", 10, None, None).unwrap();
        assert_eq!(cache.get(&1), Some(&"a"));
    }

    #[test]
    fn negative_size_is_invalid_argument() {
        let mut cache: LruCache<i32, &str> = LruCache::new(3);
        let err = cache.set(1, "a", -1, None, None).unwrap_err();
        assert_eq!(err, CacheError::InvalidArgument(-1));
    }

    #[test]
    fn eviction_is_strictly_lru() {
        let mut cache: LruCache<i32, i32> = LruCache::new(3);
        cache.set(2022, 1, 10, None, None).unwrap();
        cache.set(2023, 2, 10, None, None).unwrap();
        cache.set(2024, 3, 10, None, None).unwrap();

        // Touch 2022 -> MRU order becomes [2023, 2024, 2022].
        assert_eq!(cache.get(&2022), Some(&1));

        // Inserting 2021 evicts 2023 (the new LRU).
        cache.set(2021, 4, 10, None, None).unwrap();
        assert!(!cache.has(&2023));
        assert!(cache.has(&2022));
        assert!(cache.has(&2024));
        assert!(cache.has(&2021));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn total_bytes_tracks_sum_of_entries_including_on_replace() {
        let mut cache: LruCache<&str, i32> = LruCache::new(5);
        cache.set("a", 1, 100, None, None).unwrap();
        cache.set("b", 2, 200, None, None).unwrap();
        assert_eq!(cache.stats().total_bytes, 300);

        cache.set("a", 10, 50, None, None).unwrap();
        assert_eq!(cache.stats().total_bytes, 250);
    }

    #[test]
    fn replace_preserves_hit_count_and_moves_to_mru() {
        let mut cache: LruCache<&str, i32> = LruCache::new(5);
        cache.set("a", 1, 10, None, None).unwrap();
        cache.get(&"a"); // hit_count -> 1
        cache.set("a", 2, 10, None, None).unwrap();
        assert_eq!(cache.hit_count(&"a"), Some(1));
    }

    #[test]
    fn expired_entry_is_absent_and_removed_on_touch() {
        let base = Instant::now();
        let mut cache: LruCache<&str, i32> = LruCache::new(5);
        cache
            .set_at("a", 1, 10, None, Some(base + Duration::from_secs(1)), base)
            .unwrap();
        assert!(cache.has_at(&"a", base + Duration::from_millis(500)));
        assert!(!cache.has_at(&"a", base + Duration::from_secs(2)));
        assert_eq!(cache.stats().total_bytes, 0);
    }

    #[test]
    fn stats_reports_labels_oldest_to_newest() {
        let mut cache: LruCache<i32, i32> = LruCache::new(5);
        cache
            .set(1, 1, 1, Some("one".into()), None)
            .unwrap();
        cache
            .set(2, 2, 1, Some("two".into()), None)
            .unwrap();
        let stats = cache.stats();
        assert_eq!(
            stats.labels_oldest_to_newest,
            vec![Some("one".to_string()), Some("two".to_string())]
        );
    }

    #[test]
    fn clear_empties_and_zeroes_bytes() {
        let mut cache: LruCache<i32, i32> = LruCache::new(5);
        cache.set(1, 1, 10, None, None).unwrap();
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().total_bytes, 0);
    }
}
