use super::config::DEFAULT_CACHE_MAX_ENTRIES;
use super::normalize::NormalizedSeries;
use super::query::RequestDescriptor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// TTL cache of normalized results keyed by request fingerprint
///
/// Boards re-issue identical queries on every refresh; within the TTL those
/// are answered without touching the backend. At most `max_entries` results
/// are held; storing past that drops expired entries, then the oldest one.
#[derive(Debug)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug)]
struct CachedEntry {
    series: NormalizedSeries,
    stored_at: Instant,
}

impl CachedEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() <= ttl
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_max_entries(ttl, DEFAULT_CACHE_MAX_ENTRIES)
    }

    /// Cache holding at most `max_entries` results, never fewer than one
    #[must_use]
    pub fn with_max_entries(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub async fn get(&self, request: &RequestDescriptor) -> Option<NormalizedSeries> {
        let key = request.fingerprint();
        let entries = self.entries.read().await;

        match entries.get(&key) {
            Some(entry) if entry.is_fresh(self.ttl) => {
                debug!("🎯 Cache HIT: {}", key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.series.clone())
            }
            Some(_) => {
                debug!("🔄 Cache STALE: {}", key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                debug!("❌ Cache MISS: {}", key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn put(&self, request: &RequestDescriptor, series: NormalizedSeries) {
        let key = request.fingerprint();
        debug!("💾 Cache STORE: {} ({} points)", key, series.len());

        let entry = CachedEntry {
            series,
            stored_at: Instant::now(),
        };

        let mut entries = self.entries.write().await;
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, cached| cached.is_fresh(self.ttl));
            if entries.len() >= self.max_entries {
                Self::evict_oldest(&mut entries);
            }
        }
        entries.insert(key, entry);
    }

    fn evict_oldest(entries: &mut HashMap<String, CachedEntry>) {
        let oldest_key = entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest_key {
            entries.remove(&key);
            debug!("🗑️ Cache EVICT: {}", key);
        }
    }

    pub async fn invalidate(&self, request: &RequestDescriptor) {
        self.entries.write().await.remove(&request.fingerprint());
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drop every entry older than the TTL, returning how many were removed
    pub async fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(self.ttl));
        before - entries.len()
    }

    #[allow(clippy::significant_drop_tightening)]
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;

        CacheStats {
            total_entries: entries.len(),
            fresh_entries: entries.values().filter(|e| e.is_fresh(self.ttl)).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Share of lookups answered from the cache, 0.0 before any lookup
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }
}
