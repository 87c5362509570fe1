//! Thread-safe LRU cache for per-key metadata.
//!
//! The cache bounds itself on two axes at once (entry count and estimated
//! byte size) and expires entries after a TTL. Eviction runs on `set` and
//! removes least-recently-used entries until both caps hold; an expired
//! entry found on `get` is removed and counted as a miss. Probing wraps
//! metadata lookups opportunistically, so a stale entry only costs one
//! redundant HTTP fetch, never a wrong filter decision against fresh data
//! the caller supplied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;

use kvbulk_config::constants::{
    DEFAULT_CACHE_MAX_BYTES, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS,
};

/// Fixed bookkeeping cost charged per entry on top of key and payload bytes.
const ENTRY_OVERHEAD_BYTES: usize = 64;

struct CacheSlot {
    metadata: serde_json::Value,
    bytes: usize,
    inserted_at: Instant,
}

struct Inner {
    lru: LruCache<String, CacheSlot>,
    total_bytes: usize,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hits over total lookups; zero when nothing was looked up yet.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Thread-safe LRU metadata cache with entry, byte and TTL bounds.
pub struct MetadataCache {
    // `get` bumps recency, so it takes the write half too; `stats` and
    // `len` are the shared-lock readers.
    inner: RwLock<Inner>,
    max_entries: usize,
    max_bytes: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    /// Create a cache with explicit bounds.
    pub fn new(max_entries: usize, max_bytes: usize, ttl: Duration) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            inner: RwLock::new(Inner {
                lru: LruCache::unbounded(),
                total_bytes: 0,
            }),
            max_entries,
            max_bytes: max_bytes.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache with the workspace defaults (10,000 entries, 50 MiB,
    /// 5-minute TTL).
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_CACHE_MAX_ENTRIES,
            DEFAULT_CACHE_MAX_BYTES,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
    }

    /// Process-wide instance, constructed on first call with the defaults.
    ///
    /// Call this once during startup rather than from hot paths; per-run
    /// orchestrations should take an injected cache instead.
    pub fn global() -> &'static MetadataCache {
        static GLOBAL: OnceLock<MetadataCache> = OnceLock::new();
        GLOBAL.get_or_init(MetadataCache::with_defaults)
    }

    fn entry_cost(key: &str, metadata: &serde_json::Value) -> usize {
        let payload = serde_json::to_string(metadata).map_or(0, |s| s.len());
        key.len() + payload + ENTRY_OVERHEAD_BYTES
    }

    /// Look up metadata for `key`, refreshing its recency.
    ///
    /// Expired entries are removed and counted as a miss.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut inner = self.write_lock();

        let expired = match inner.lru.get(key) {
            Some(slot) => slot.inserted_at.elapsed() > self.ttl,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            if let Some(slot) = inner.lru.pop(key) {
                inner.total_bytes = inner.total_bytes.saturating_sub(slot.bytes);
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        inner.lru.get(key).map(|slot| slot.metadata.clone())
    }

    /// Insert or replace metadata for `key`, then evict least-recently-used
    /// entries until both the entry cap and the byte cap hold.
    pub fn set(&self, key: &str, metadata: serde_json::Value) {
        let bytes = Self::entry_cost(key, &metadata);
        let mut inner = self.write_lock();

        if let Some(previous) = inner.lru.put(
            key.to_string(),
            CacheSlot {
                metadata,
                bytes,
                inserted_at: Instant::now(),
            },
        ) {
            inner.total_bytes = inner.total_bytes.saturating_sub(previous.bytes);
        }
        inner.total_bytes += bytes;

        while (inner.lru.len() > self.max_entries || inner.total_bytes > self.max_bytes)
            && !inner.lru.is_empty()
        {
            if let Some((_, evicted)) = inner.lru.pop_lru() {
                inner.total_bytes = inner.total_bytes.saturating_sub(evicted.bytes);
            }
        }
    }

    /// Remove one key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.write_lock();
        match inner.lru.pop(key) {
            Some(slot) => {
                inner.total_bytes = inner.total_bytes.saturating_sub(slot.bytes);
                true
            }
            None => false,
        }
    }

    /// Drop every entry. Hit/miss counters are preserved.
    pub fn clear(&self) {
        let mut inner = self.write_lock();
        inner.lru.clear();
        inner.total_bytes = 0;
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.read_lock().lru.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry count, estimated size and lookup counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.read_lock();
        CacheStats {
            entries: inner.lru.len(),
            size: inner.total_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
