// TTL cache shared by every upstream-backed route.
// Entries carry an absolute expiry instant and are evicted lazily by the read that finds them stale.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

// Live counters for the cache
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub expired_count: AtomicUsize,
    pub eviction_count: AtomicUsize,
}

// Point-in-time copy of the counters
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsReport {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub eviction_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    // None keeps the cache unbounded; expiry is then the only removal path
    pub max_entries: Option<usize>,
}

pub trait TtlCache<V>: Send + Sync + 'static {
    // Returns the value if present and not yet expired
    fn get(&self, key: &str) -> Option<V>;

    // Stores (or replaces) a value that stays valid for `ttl`
    fn put(&self, key: &str, value: V, ttl: Duration);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStatsReport;
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct MemoryTtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    config: CacheConfig,
    stats: CacheStats,
}

impl<V: Clone + Send + Sync + 'static> MemoryTtlCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: CacheStats::default(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(CacheConfig::default())
    }

    fn purge_expired(&self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            self.stats.expired_count.fetch_add(purged, Ordering::Relaxed);
        }
    }

    // Oldest expiry goes first; it is the entry closest to going stale anyway
    fn evict_oldest_expiry(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            if self.entries.remove(&key).is_some() {
                debug!(%key, "evicting cache entry to stay within capacity");
                self.stats.eviction_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn make_room(&self, key: &str) {
        let Some(max_entries) = self.config.max_entries else {
            return;
        };
        if self.entries.contains_key(key) || self.entries.len() < max_entries {
            return;
        }

        self.purge_expired(Instant::now());
        while self.entries.len() >= max_entries.max(1) {
            self.evict_oldest_expiry();
        }
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> for MemoryTtlCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.stats.hit_count.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        // The read guard is released above; removing while holding it would deadlock the shard
        if expired
            && self
                .entries
                .remove_if(key, |_, entry| entry.is_expired(now))
                .is_some()
        {
            debug!(%key, "cache entry expired");
            self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn put(&self, key: &str, value: V, ttl: Duration) {
        self.make_room(key);
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            items_count: self.entries.len(),
            hit_count: self.stats.hit_count.load(Ordering::Relaxed),
            miss_count: self.stats.miss_count.load(Ordering::Relaxed),
            expired_count: self.stats.expired_count.load(Ordering::Relaxed),
            eviction_count: self.stats.eviction_count.load(Ordering::Relaxed),
        }
    }
}
