// In-memory implementation of the counter store.
//
// Quota and throttle counters only need get/put/has/forget with TTLs, so a
// DashMap with per-entry deadlines covers single-process deployments and
// tests. Production multi-process setups swap this for a shared cache
// behind the same trait; the counter logic never changes.
//
// Expired entries are evicted lazily, on the access that notices them.

use crate::core::cache::{CacheError, CounterStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Instant,
}

pub struct InMemoryCounterStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Live value under `key`, evicting it if its TTL has lapsed.
    fn live(&self, key: &str) -> Option<i64> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value),
            Some(_) => true,
            None => false,
        };

        if expired {
            // remove_if re-checks under the shard lock so we never evict an
            // entry a concurrent put just refreshed.
            self.entries
                .remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        }

        None
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        Ok(self.live(key))
    }

    async fn put(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live(key).is_some())
    }

    async fn forget(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
