//! In-process TTL cache for generated insights
//!
//! Entries are keyed by dataset id plus canonical filter state (see
//! [`DashboardFilters::cache_key`](crate::filter::DashboardFilters::cache_key)).
//! An expired entry is dropped the next time it is read, and every write
//! sweeps out whatever else has expired. Past the capacity the least recently
//! used entry is evicted.
//!
//! Hit and miss logging lives with the caller, which knows the dataset.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::types::DatasetInsight;

/// Default time-to-live for cached insight lists
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default number of insight lists kept
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Hex length of the filter digest that ends every cache key
const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone)]
struct CachedEntry {
    insights: Vec<DatasetInsight>,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Counters for observing cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

/// Thread-safe TTL store of insight lists with LRU eviction
pub struct InsightCache {
    entries: RwLock<LruCache<String, CachedEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl Default for InsightCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl InsightCache {
    /// Create a cache with the given TTL and the default capacity
    ///
    /// A zero TTL disables caching: writes are dropped and reads always miss.
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `capacity` lists (minimum 1)
    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached list if present and not expired
    pub async fn find_cached(&self, key: &str) -> Option<Vec<DatasetInsight>> {
        if self.ttl.is_zero() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let found = entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.insights.clone()));

        match found {
            Some(Some(insights)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(insights)
            }
            Some(None) => {
                entries.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a list, replacing any previous entry for the key
    pub async fn save_to_cache(&self, key: &str, insights: Vec<DatasetInsight>) {
        if self.ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let swept = remove_where(&mut entries, |_, entry| entry.is_expired(now));
        if swept > 0 {
            tracing::debug!(swept, "Swept expired insight cache entries");
        }

        if let Some((evicted, _)) = entries.push(
            key.to_string(),
            CachedEntry {
                insights,
                expires_at: now + self.ttl,
            },
        ) {
            if evicted != key {
                tracing::debug!(key = %evicted, "Evicted least recently used insight list");
            }
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove one entry early
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.pop(key).is_some()
    }

    /// Remove every entry for a dataset, whatever its filter state
    ///
    /// Only keys whose dataset part equals `dataset_id` exactly are removed,
    /// so ids that contain `:` never match a shorter id.
    pub async fn invalidate_dataset(&self, dataset_id: &str) -> usize {
        let mut entries = self.entries.write().await;
        remove_where(&mut entries, |key, _| key_dataset(key) == Some(dataset_id))
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of stored entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Dataset id of an `insights:<dataset_id>:<digest>` key
fn key_dataset(key: &str) -> Option<&str> {
    let (dataset_id, digest) = key.strip_prefix("insights:")?.rsplit_once(':')?;
    let is_digest =
        digest.len() == DIGEST_HEX_LEN && digest.bytes().all(|b| b.is_ascii_hexdigit());
    is_digest.then_some(dataset_id)
}

fn remove_where<F>(entries: &mut LruCache<String, CachedEntry>, remove: F) -> usize
where
    F: Fn(&str, &CachedEntry) -> bool,
{
    let doomed: Vec<String> = entries
        .iter()
        .filter(|(key, entry)| remove(key.as_str(), entry))
        .map(|(key, _)| key.clone())
        .collect();
    for key in &doomed {
        entries.pop(key);
    }
    doomed.len()
}
