// Per-user submission throttling.
//
// Caps how many chirps a user can post (or edit) per hour, independent of
// the global Gemini quota. Counters live in the shared counter store under
// per-user keys with a one-hour TTL; like the quota tracker, a marker key
// records when the window resets so the wait can be reported.

use crate::core::cache::{CacheError, CounterStore};
use chrono::Utc;
use std::time::Duration;

/// Rate limit: 10 chirps per hour.
pub const MAX_CHIRPS_PER_HOUR: i64 = 10;

/// Window length in seconds.
const WINDOW_SECS: i64 = 3600;

/// Outcome of asking the throttle to admit one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Limited { retry_after_secs: i64 },
}

pub struct SubmissionThrottle<C: CounterStore> {
    store: C,
}

impl<C: CounterStore> SubmissionThrottle<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    /// Admit one submission for `user_id`, incrementing their counter, or
    /// deny with the seconds left in the current window.
    ///
    /// Unauthenticated requests never reach this call; the chirp service
    /// rejects them before any throttle bookkeeping happens.
    pub async fn admit(&self, user_id: i64) -> Result<ThrottleDecision, CacheError> {
        let count_key = Self::count_key(user_id);
        let reset_key = Self::reset_key(user_id);

        let count = self.store.get(&count_key).await?.unwrap_or(0);

        if count >= MAX_CHIRPS_PER_HOUR {
            let retry_after_secs = match self.store.get(&reset_key).await? {
                Some(resets_at) => (resets_at - Utc::now().timestamp()).max(0),
                None => WINDOW_SECS,
            };

            tracing::debug!(
                user_id,
                retry_after_secs,
                "Chirp submission throttled"
            );

            return Ok(ThrottleDecision::Limited { retry_after_secs });
        }

        let ttl = Duration::from_secs(WINDOW_SECS as u64);
        self.store.put(&count_key, count + 1, ttl).await?;

        // First submission of the window pins the reset instant.
        if !self.store.has(&reset_key).await? {
            self.store
                .put(&reset_key, Utc::now().timestamp() + WINDOW_SECS, ttl)
                .await?;
        }

        Ok(ThrottleDecision::Allowed)
    }

    fn count_key(user_id: i64) -> String {
        format!("chirp_rate_limit_{user_id}")
    }

    fn reset_key(user_id: i64) -> String {
        format!("chirp_rate_limit_reset_{user_id}")
    }
}
