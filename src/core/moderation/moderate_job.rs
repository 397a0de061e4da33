// The moderation job - classify one chirp and commit the verdict.
//
// Runs asynchronously relative to the submission that enqueued it. The one
// promise this handler makes is that a chirp never stays pending because
// moderation broke: any fault flips the chirp to approved-by-default before
// the error is propagated to the runner. Suppressing content because our
// pipeline fell over is the failure mode we refuse to have.

use super::moderation_models::{ModerationState, Verdict};
use super::moderation_service::{AiModerator, ModerationService};
use crate::core::cache::CounterStore;
use crate::core::chirps::{Chirp, ChirpStore};
use crate::core::jobs::{JobHandler, ModerationJob};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Reason recorded when an attempt faults and we approve instead.
const FAULT_APPROVE_REASON: &str = "Moderation failed - approved by default";

/// Reason recorded by the terminal failure hook after retries exhaust.
const TERMINAL_APPROVE_REASON: &str = "Moderation job failed - approved by default";

/// How much of a rejected message the review notice quotes.
const REJECTED_PREVIEW_CHARS: usize = 50;

pub struct ModerateChirp<S, M, C>
where
    S: ChirpStore,
    M: AiModerator,
    C: CounterStore,
{
    store: Arc<S>,
    moderation: Arc<ModerationService<M, C>>,
}

impl<S, M, C> ModerateChirp<S, M, C>
where
    S: ChirpStore,
    M: AiModerator,
    C: CounterStore,
{
    pub fn new(store: Arc<S>, moderation: Arc<ModerationService<M, C>>) -> Self {
        Self { store, moderation }
    }

    async fn moderate(&self, chirp_id: i64) -> Result<()> {
        let chirp = self
            .store
            .get(chirp_id)
            .await
            .context("loading chirp for moderation")?
            .ok_or_else(|| anyhow!("chirp {chirp_id} not found"))?;

        let verdict = self.moderation.classify(&chirp.message).await;
        let state = ModerationState::from_verdict(&verdict, Utc::now());
        self.store
            .set_moderation_state(chirp.id, &state)
            .await
            .context("persisting moderation verdict")?;

        tracing::info!(
            chirp_id = chirp.id,
            status = %verdict.decision,
            reason = %verdict.reason,
            confidence = verdict.confidence,
            "AI moderation completed"
        );

        if verdict.is_rejected() {
            self.flag_for_review(&chirp, &verdict);
        }

        Ok(())
    }

    /// Surface a rejected chirp for downstream human review. Observability
    /// only; the stored state is already committed.
    fn flag_for_review(&self, chirp: &Chirp, verdict: &Verdict) {
        let preview: String = chirp.message.chars().take(REJECTED_PREVIEW_CHARS).collect();

        tracing::warn!(
            chirp_id = chirp.id,
            user_id = chirp.user_id,
            reason = %verdict.reason,
            message_preview = %preview,
            "Chirp rejected by moderation"
        );
    }

    /// Force a chirp to approved with the given reason, logging rather than
    /// propagating any write failure - this runs on paths that already hold
    /// an error.
    async fn force_approve(&self, chirp_id: i64, reason: &str) {
        let state = ModerationState::Approved {
            reason: reason.to_string(),
            moderated_at: Utc::now(),
        };

        if let Err(e) = self.store.set_moderation_state(chirp_id, &state).await {
            tracing::error!(chirp_id, "Failed to force-approve chirp: {e}");
        }
    }
}

#[async_trait]
impl<S, M, C> JobHandler for ModerateChirp<S, M, C>
where
    S: ChirpStore,
    M: AiModerator,
    C: CounterStore,
{
    async fn handle(&self, job: &ModerationJob) -> Result<()> {
        tracing::info!(chirp_id = job.chirp_id, "Starting AI moderation for chirp");

        let outcome = self.moderate(job.chirp_id).await;

        if let Err(e) = &outcome {
            tracing::error!(chirp_id = job.chirp_id, "AI moderation attempt failed: {e:#}");

            // Approve rather than block content when moderation itself is
            // what broke; the error still propagates so the runner counts
            // the attempt.
            self.force_approve(job.chirp_id, FAULT_APPROVE_REASON).await;
        }

        outcome
    }

    async fn failed(&self, job: &ModerationJob, error: &anyhow::Error) {
        tracing::error!(
            chirp_id = job.chirp_id,
            "Moderation job failed permanently: {error:#}"
        );

        // Idempotent: a chirp some attempt (or a racing job) already
        // resolved is left alone.
        match self.store.get(job.chirp_id).await {
            Ok(Some(chirp)) if chirp.state.is_pending() => {
                self.force_approve(job.chirp_id, TERMINAL_APPROVE_REASON)
                    .await;
            }
            Ok(Some(_)) | Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    chirp_id = job.chirp_id,
                    "Could not load chirp in failure handler: {e}"
                );
            }
        }
    }
}
