// Chirp submission service - the inbound surface of the moderation core.
//
// The web layer calls submit/edit and renders whatever comes back; every
// gate a chirp passes on its way into the pipeline lives here, in order:
// authentication, the per-user throttle, the daily AI budget gate,
// validation, then persist-as-pending and enqueue.

use super::chirp_models::{Chirp, ChirpStore, ChirpStoreError};
use crate::core::cache::{CacheError, CounterStore};
use crate::core::jobs::{JobQueue, ModerationJob, QueueError};
use crate::core::moderation::ModerationState;
use crate::core::quota::QuotaTracker;
use crate::core::throttle::{SubmissionThrottle, ThrottleDecision};
use std::sync::Arc;
use thiserror::Error;

/// Hard cap on chirp length, matching the message column contract.
pub const MAX_MESSAGE_CHARS: usize = 255;

/// How a submission or edit was disposed of. All three are normal outcomes
/// the caller renders to the user, not faults.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Persisted as pending; a moderation job is on the queue.
    Accepted { chirp_id: i64 },
    /// The user hit the hourly submission cap.
    Throttled { retry_after_secs: i64 },
    /// The global daily AI budget is spent; new content is not accepted
    /// until it resets. Carries the user-facing status message.
    QuotaExhausted { message: String },
}

#[derive(Debug, Error)]
pub enum ChirpError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Chirp can only be edited by its author")]
    Forbidden,

    #[error("Chirp {0} not found")]
    NotFound(i64),

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Message must be {MAX_MESSAGE_CHARS} characters or less")]
    MessageTooLong,

    #[error(transparent)]
    Store(#[from] ChirpStoreError),

    #[error("Counter store error: {0}")]
    Cache(#[from] CacheError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

pub struct ChirpService<S, C, Q>
where
    S: ChirpStore,
    C: CounterStore,
    Q: JobQueue,
{
    store: Arc<S>,
    throttle: SubmissionThrottle<C>,
    quota: Arc<QuotaTracker<C>>,
    queue: Arc<Q>,
}

impl<S, C, Q> ChirpService<S, C, Q>
where
    S: ChirpStore,
    C: CounterStore,
    Q: JobQueue,
{
    pub fn new(
        store: Arc<S>,
        throttle: SubmissionThrottle<C>,
        quota: Arc<QuotaTracker<C>>,
        queue: Arc<Q>,
    ) -> Self {
        Self {
            store,
            throttle,
            quota,
            queue,
        }
    }

    /// Create a new chirp for `identity`. It enters the pipeline pending
    /// and becomes visible only if moderation approves it.
    pub async fn submit(
        &self,
        identity: Option<i64>,
        message: &str,
    ) -> Result<SubmitOutcome, ChirpError> {
        // Authentication comes first: guests never touch the throttle.
        let user_id = identity.ok_or(ChirpError::Unauthenticated)?;

        if let Some(outcome) = self.gate(user_id).await? {
            return Ok(outcome);
        }
        let message = Self::validate(message)?;

        let chirp = self.store.create(user_id, message).await?;
        self.enqueue(&chirp).await?;

        tracing::info!(chirp_id = chirp.id, user_id, "Chirp submitted for moderation");

        Ok(SubmitOutcome::Accepted { chirp_id: chirp.id })
    }

    /// Replace a chirp's message. The chirp re-enters the pipeline: state
    /// resets to pending (clearing reason and timestamp) and a fresh
    /// moderation job is enqueued.
    pub async fn edit(
        &self,
        identity: Option<i64>,
        chirp_id: i64,
        message: &str,
    ) -> Result<SubmitOutcome, ChirpError> {
        let user_id = identity.ok_or(ChirpError::Unauthenticated)?;

        if let Some(outcome) = self.gate(user_id).await? {
            return Ok(outcome);
        }

        let chirp = self
            .store
            .get(chirp_id)
            .await?
            .ok_or(ChirpError::NotFound(chirp_id))?;
        if chirp.user_id != user_id {
            return Err(ChirpError::Forbidden);
        }

        let message = Self::validate(message)?;

        self.store.update_message(chirp_id, message).await?;
        self.store
            .set_moderation_state(chirp_id, &ModerationState::Pending)
            .await?;
        self.enqueue(&chirp).await?;

        tracing::info!(chirp_id, user_id, "Chirp edited, re-entering moderation");

        Ok(SubmitOutcome::Accepted { chirp_id })
    }

    /// Approved chirps, newest first.
    pub async fn visible_chirps(&self, limit: i64) -> Result<Vec<Chirp>, ChirpError> {
        Ok(self.store.list_approved(limit).await?)
    }

    /// Shared pre-gates: throttle, then the daily AI budget. Returns the
    /// terminal outcome when a gate denies, None when the path is clear.
    async fn gate(&self, user_id: i64) -> Result<Option<SubmitOutcome>, ChirpError> {
        if let ThrottleDecision::Limited { retry_after_secs } = self.throttle.admit(user_id).await?
        {
            return Ok(Some(SubmitOutcome::Throttled { retry_after_secs }));
        }

        // When the daily budget is spent we stop accepting new content
        // instead of silently letting everything ride the fallback rules.
        if self.quota.is_limit_reached().await? {
            return Ok(Some(SubmitOutcome::QuotaExhausted {
                message: self.quota.status_message().await?,
            }));
        }

        Ok(None)
    }

    async fn enqueue(&self, chirp: &Chirp) -> Result<(), QueueError> {
        self.queue
            .enqueue(ModerationJob {
                chirp_id: chirp.id,
            })
            .await
    }

    fn validate(message: &str) -> Result<&str, ChirpError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(ChirpError::EmptyMessage);
        }
        if trimmed.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChirpError::MessageTooLong);
        }
        Ok(trimmed)
    }
}
