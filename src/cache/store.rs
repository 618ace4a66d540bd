//! Cache store implementation

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::entry::CacheEntry;

/// Cache statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
  /// Always `hits + misses`
  pub requests: u64,
  pub hits: u64,
  pub misses: u64,
  /// Entries removed to respect `max_entries`
  pub evictions: u64,
  /// Entries dropped because their TTL elapsed
  pub expired: u64,
  pub current_size: usize,
  pub max_entries: usize,
}

impl CacheStats {
  pub fn hit_rate(&self) -> f64 {
    if self.requests == 0 {
      0.0
    } else {
      self.hits as f64 / self.requests as f64
    }
  }

  pub fn miss_rate(&self) -> f64 {
    if self.requests == 0 {
      0.0
    } else {
      self.misses as f64 / self.requests as f64
    }
  }
}

/// Bounded, time-expiring key/value cache.
///
/// Every operation is infallible: a cache that cannot hold a value simply
/// reports it absent later, and callers fall back to storage.
pub trait CacheStore<K, V>: Send + Sync {
  /// Look up a live entry. Counts one request and exactly one hit or miss.
  fn get(&self, key: &K) -> Option<V>;

  /// Insert or overwrite, resetting the entry's age.
  fn put(&self, key: K, value: V);

  /// Remove one entry; returns whether it was present.
  fn invalidate(&self, key: &K) -> bool;

  /// Remove every entry. Counters are kept.
  fn invalidate_all(&self);

  fn stats(&self) -> CacheStats;
}

/// In-memory LRU cache with a fixed TTL per instance
pub struct TtlLruCache<K: Hash + Eq, V> {
  name: &'static str,
  /// `None` when configured with zero capacity
  entries: Option<Mutex<LruCache<K, CacheEntry<V>>>>,
  max_entries: usize,
  ttl: Duration,
  hits: AtomicU64,
  misses: AtomicU64,
  evictions: AtomicU64,
  expired: AtomicU64,
}

impl<K: Hash + Eq, V> TtlLruCache<K, V> {
  pub fn new(name: &'static str, max_entries: usize, ttl: Duration) -> Self {
    let entries = NonZeroUsize::new(max_entries).map(|cap| Mutex::new(LruCache::new(cap)));
    if entries.is_none() {
      tracing::warn!("Cache '{}' configured with zero capacity; caching disabled", name);
    }
    Self {
      name,
      entries,
      max_entries,
      ttl,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
      evictions: AtomicU64::new(0),
      expired: AtomicU64::new(0),
    }
  }

  /// Number of entries currently held, including expired ones not yet purged
  pub fn len(&self) -> usize {
    self.entries.as_ref().map(|e| e.lock().len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }
}

impl<K: Hash + Eq + Clone, V> TtlLruCache<K, V> {
  /// Drop every entry whose TTL has elapsed. Returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let Some(entries) = &self.entries else {
      return 0;
    };
    let mut entries = entries.lock();
    let expired_keys: Vec<K> = entries
      .iter()
      .filter(|(_, entry)| entry.is_expired())
      .map(|(k, _)| k.clone())
      .collect();

    for key in &expired_keys {
      entries.pop(key);
    }
    let count = expired_keys.len();
    self.expired.fetch_add(count as u64, Ordering::Relaxed);
    count
  }
}

impl<K, V> CacheStore<K, V> for TtlLruCache<K, V>
where
  K: Hash + Eq + Send,
  V: Clone + Send,
{
  fn get(&self, key: &K) -> Option<V> {
    let Some(entries) = &self.entries else {
      self.record_miss();
      return None;
    };
    let mut entries = entries.lock();

    // Some(None) marks an entry that is present but past its TTL
    let lookup = entries
      .get(key)
      .map(|entry| (!entry.is_expired()).then(|| entry.value.clone()));

    match lookup {
      Some(Some(value)) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(cache = self.name, "hit");
        Some(value)
      }
      Some(None) => {
        entries.pop(key);
        self.expired.fetch_add(1, Ordering::Relaxed);
        self.record_miss();
        tracing::trace!(cache = self.name, "miss (expired)");
        None
      }
      None => {
        self.record_miss();
        tracing::trace!(cache = self.name, "miss");
        None
      }
    }
  }

  fn put(&self, key: K, value: V) {
    let Some(entries) = &self.entries else {
      return;
    };
    let mut entries = entries.lock();

    if !entries.contains(&key) && entries.len() >= self.max_entries {
      if let Some((_, victim)) = entries.pop_lru() {
        if victim.is_expired() {
          self.expired.fetch_add(1, Ordering::Relaxed);
        } else {
          self.evictions.fetch_add(1, Ordering::Relaxed);
        }
      }
    }

    entries.put(key, CacheEntry::new(value, self.ttl));
  }

  fn invalidate(&self, key: &K) -> bool {
    self
      .entries
      .as_ref()
      .map(|e| e.lock().pop(key).is_some())
      .unwrap_or(false)
  }

  fn invalidate_all(&self) {
    if let Some(entries) = &self.entries {
      entries.lock().clear();
    }
  }

  fn stats(&self) -> CacheStats {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    CacheStats {
      requests: hits + misses,
      hits,
      misses,
      evictions: self.evictions.load(Ordering::Relaxed),
      expired: self.expired.load(Ordering::Relaxed),
      current_size: self.len(),
      max_entries: self.max_entries,
    }
  }
}
