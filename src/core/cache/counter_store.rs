// Counter store port - the narrow cache interface shared counters live behind.
//
// Quota and throttle counters are externally stored state with TTL-based
// expiry standing in for their reset clocks. Counter logic only ever needs
// get/put/has/forget on string keys, so that's all this port exposes;
// no multi-key transactions are assumed. Swapping the in-memory map for a
// distributed cache is an infra concern.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetch the value stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError>;

    /// Store `value` under `key` for `ttl`, replacing any existing entry.
    async fn put(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError>;

    /// Whether a live entry exists under `key`.
    async fn has(&self, key: &str) -> Result<bool, CacheError>;

    /// Drop the entry under `key`, expired or not.
    async fn forget(&self, key: &str) -> Result<(), CacheError>;
}

// Blanket implementation for Arc<C>.
// The quota tracker, the submission throttle, and the chirp service all
// share one physical store, so each takes an Arc handle to it.
#[async_trait]
impl<C: CounterStore + ?Sized> CounterStore for Arc<C> {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        (**self).put(key, value, ttl).await
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        (**self).has(key).await
    }

    async fn forget(&self, key: &str) -> Result<(), CacheError> {
        (**self).forget(key).await
    }
}
