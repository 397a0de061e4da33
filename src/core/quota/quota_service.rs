// Daily quota tracking for the Gemini moderation API.
//
// The free tier allows a fixed number of requests per day, resetting at
// midnight Pacific (Google's quota clock). The counter lives in the shared
// counter store with a TTL that expires at the reset boundary, so expiry IS
// the reset; a separate marker key remembers the exact reset instant so it
// can be reported before the first expiry is observed.

use crate::core::cache::{CacheError, CounterStore};
use chrono::{DateTime, Days, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use std::time::Duration;

/// Daily limit for Gemini API requests.
pub const DAILY_REQUEST_LIMIT: i64 = 1000;

/// Cache key for tracking daily requests.
const COUNT_KEY: &str = "gemini_daily_requests";

/// Cache key for tracking when the limit resets.
const RESET_KEY: &str = "gemini_daily_reset";

pub struct QuotaTracker<C: CounterStore> {
    store: C,
}

impl<C: CounterStore> QuotaTracker<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    /// Whether we can make another Gemini API request today.
    pub async fn can_proceed(&self) -> Result<bool, CacheError> {
        Ok(self.current_count().await? < DAILY_REQUEST_LIMIT)
    }

    pub async fn is_limit_reached(&self) -> Result<bool, CacheError> {
        Ok(!self.can_proceed().await?)
    }

    /// Increment the daily request counter.
    ///
    /// The increment is read-then-put (slight overshoot under a race is
    /// acceptable), but it is persisted before this returns so a granted
    /// request is never lost from the count.
    pub async fn record_use(&self) -> Result<(), CacheError> {
        let count = self.current_count().await? + 1;
        let now = Utc::now();
        let ttl_secs = seconds_until_pacific_midnight(now);
        let ttl = Duration::from_secs(ttl_secs.max(1) as u64);

        self.store.put(COUNT_KEY, count, ttl).await?;

        // Remember the reset instant alongside the counter, expiring with it.
        if !self.store.has(RESET_KEY).await? {
            self.store
                .put(RESET_KEY, now.timestamp() + ttl_secs, ttl)
                .await?;
        }

        tracing::info!(
            current_count = count,
            limit = DAILY_REQUEST_LIMIT,
            remaining = DAILY_REQUEST_LIMIT - count,
            "Gemini API request count incremented"
        );

        Ok(())
    }

    /// The current daily request count.
    pub async fn current_count(&self) -> Result<i64, CacheError> {
        Ok(self.store.get(COUNT_KEY).await?.unwrap_or(0))
    }

    /// Requests still available today.
    pub async fn remaining(&self) -> Result<i64, CacheError> {
        Ok((DAILY_REQUEST_LIMIT - self.current_count().await?).max(0))
    }

    /// Seconds until the daily limit resets.
    pub async fn seconds_until_reset(&self) -> Result<i64, CacheError> {
        if let Some(resets_at) = self.store.get(RESET_KEY).await? {
            return Ok((resets_at - Utc::now().timestamp()).max(0));
        }

        Ok(seconds_until_pacific_midnight(Utc::now()))
    }

    /// Formatted time until reset, e.g. "2 hours and 30 minutes".
    pub async fn time_until_reset(&self) -> Result<String, CacheError> {
        let seconds = self.seconds_until_reset().await?;
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;

        if hours > 0 {
            Ok(format!("{hours} hours and {minutes} minutes"))
        } else {
            Ok(format!("{minutes} minutes"))
        }
    }

    /// Informative message about the current quota status, for user-facing
    /// error surfaces. Always consistent with `can_proceed`.
    pub async fn status_message(&self) -> Result<String, CacheError> {
        if self.is_limit_reached().await? {
            Ok(format!(
                "Daily AI moderation limit reached. Chirps cannot be posted or edited \
                 until the limit resets at Pacific midnight in {}.",
                self.time_until_reset().await?
            ))
        } else {
            Ok("AI moderation is available for your chirps.".to_string())
        }
    }
}

/// Seconds from `now` to the next midnight in Los Angeles, where the
/// upstream API resets its daily quota.
fn seconds_until_pacific_midnight(now: DateTime<Utc>) -> i64 {
    let local = now.with_timezone(&Los_Angeles);
    let next_midnight = (local.date_naive() + Days::new(1)).and_time(NaiveTime::MIN);

    let resets_at = match Los_Angeles.from_local_datetime(&next_midnight).earliest() {
        Some(instant) => instant.with_timezone(&Utc),
        // DST transitions in this zone happen at 02:00, never at midnight,
        // so this arm is unreachable in practice.
        None => now + ChronoDuration::hours(24),
    };

    (resets_at - now).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::time::Instant;

    /// In-memory store for testing, with manually expirable entries.
    struct MockCounterStore {
        entries: DashMap<String, (i64, Instant)>,
    }

    impl MockCounterStore {
        fn new() -> Self {
            Self {
                entries: DashMap::new(),
            }
        }

        /// Simulate the TTL boundary passing by dropping everything.
        fn expire_all(&self) {
            self.entries.clear();
        }
    }

    #[async_trait::async_trait]
    impl CounterStore for MockCounterStore {
        async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
            Ok(self
                .entries
                .get(key)
                .filter(|entry| entry.1 > Instant::now())
                .map(|entry| entry.0))
        }

        async fn put(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
            self.entries
                .insert(key.to_string(), (value, Instant::now() + ttl));
            Ok(())
        }

        async fn has(&self, key: &str) -> Result<bool, CacheError> {
            Ok(self.get(key).await?.is_some())
        }

        async fn forget(&self, key: &str) -> Result<(), CacheError> {
            self.entries.remove(key);
            Ok(())
        }
    }

    fn tracker() -> QuotaTracker<std::sync::Arc<MockCounterStore>> {
        QuotaTracker::new(std::sync::Arc::new(MockCounterStore::new()))
    }

    #[tokio::test]
    async fn test_can_proceed_when_under_limit() {
        let quota = tracker();

        assert!(quota.can_proceed().await.unwrap());
        assert_eq!(quota.current_count().await.unwrap(), 0);
        assert_eq!(quota.remaining().await.unwrap(), DAILY_REQUEST_LIMIT);
    }

    #[tokio::test]
    async fn test_record_use_increments() {
        let quota = tracker();

        quota.record_use().await.unwrap();

        assert_eq!(quota.current_count().await.unwrap(), 1);
        assert_eq!(quota.remaining().await.unwrap(), DAILY_REQUEST_LIMIT - 1);
    }

    #[tokio::test]
    async fn test_limit_reached_after_daily_budget_spent() {
        let store = std::sync::Arc::new(MockCounterStore::new());
        store
            .put(COUNT_KEY, DAILY_REQUEST_LIMIT, Duration::from_secs(3600))
            .await
            .unwrap();
        let quota = QuotaTracker::new(std::sync::Arc::clone(&store));

        assert!(!quota.can_proceed().await.unwrap());
        assert!(quota.is_limit_reached().await.unwrap());
        assert_eq!(quota.remaining().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expiry_resets_counter() {
        let store = std::sync::Arc::new(MockCounterStore::new());
        let quota = QuotaTracker::new(std::sync::Arc::clone(&store));

        for _ in 0..DAILY_REQUEST_LIMIT {
            quota.record_use().await.unwrap();
        }
        assert!(!quota.can_proceed().await.unwrap());

        // A day boundary shows up to the tracker as cache expiry.
        store.expire_all();

        assert!(quota.can_proceed().await.unwrap());
        assert_eq!(quota.current_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_use_stores_reset_marker() {
        let store = std::sync::Arc::new(MockCounterStore::new());
        let quota = QuotaTracker::new(std::sync::Arc::clone(&store));

        assert!(!store.has(RESET_KEY).await.unwrap());
        quota.record_use().await.unwrap();
        assert!(store.has(RESET_KEY).await.unwrap());

        let seconds = quota.seconds_until_reset().await.unwrap();
        assert!(seconds > 0);
        assert!(seconds <= 86_400);
    }

    #[tokio::test]
    async fn test_seconds_until_reset_without_marker_is_computed_fresh() {
        let quota = tracker();

        let seconds = quota.seconds_until_reset().await.unwrap();
        assert!(seconds > 0);
        assert!(seconds <= 86_400);
    }

    #[tokio::test]
    async fn test_status_message_when_under_limit() {
        let quota = tracker();

        let message = quota.status_message().await.unwrap();
        assert!(message.contains("AI moderation is available"));
    }

    #[tokio::test]
    async fn test_status_message_when_limit_reached() {
        let store = std::sync::Arc::new(MockCounterStore::new());
        store
            .put(COUNT_KEY, DAILY_REQUEST_LIMIT, Duration::from_secs(3600))
            .await
            .unwrap();
        let quota = QuotaTracker::new(store);

        let message = quota.status_message().await.unwrap();
        assert!(message.contains("Daily AI moderation limit reached"));
        assert!(message.contains("cannot be posted or edited"));
        assert!(message.contains("Pacific midnight"));
    }

    #[tokio::test]
    async fn test_time_until_reset_formatting() {
        let store = std::sync::Arc::new(MockCounterStore::new());
        let quota = QuotaTracker::new(std::sync::Arc::clone(&store));

        // 2 hours and 30 minutes out
        store
            .put(
                RESET_KEY,
                Utc::now().timestamp() + 2 * 3600 + 30 * 60,
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        let formatted = quota.time_until_reset().await.unwrap();
        assert!(formatted.contains("2 hours"));
        assert!(formatted.contains("minutes"));

        // 45 minutes out: no hours fragment
        store
            .put(
                RESET_KEY,
                Utc::now().timestamp() + 45 * 60,
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        let formatted = quota.time_until_reset().await.unwrap();
        assert!(!formatted.contains("hours"));
        assert!(formatted.contains("minutes"));
    }

    #[test]
    fn test_pacific_midnight_is_within_a_day() {
        let seconds = seconds_until_pacific_midnight(Utc::now());
        assert!(seconds > 0);
        assert!(seconds <= 86_400 + 3600); // DST fall-back day is 25 hours
    }
}
