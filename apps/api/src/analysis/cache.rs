use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

pub const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(30);

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Time-bounded cache in front of the analysis record store.
///
/// Expiry is checked on read only: stale entries are reported as absent but
/// stay in the map until overwritten, so the map grows with the number of
/// distinct keys for the life of the process. Concurrent writers follow
/// last-write-wins.
pub struct StatusCache<V> {
    ttl: Duration,
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> StatusCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for StatusCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_TTL)
    }
}
