// Moderation orchestration - quota check, AI call, heuristic fallback.
//
// The service owns the fallback order: while daily budget remains, content
// goes to the AI moderator; any way that path can degrade (no key, network
// trouble, unparsable answer, exhausted budget) lands on the local rules.
// Callers always get a verdict - degradation is never surfaced upward.

use super::moderation_models::Verdict;
use super::rules;
use crate::core::cache::CounterStore;
use crate::core::quota::QuotaTracker;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Ways the AI moderator can fail to produce a verdict. Every variant means
/// the same thing to the orchestrator: fall back to the rules, and don't
/// charge the daily quota.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("No API key configured")]
    MissingKey,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API returned status {0}")]
    Status(u16),

    #[error("Unparsable model answer: {0:?}")]
    Unparsable(String),
}

/// Port for the external AI classifier.
#[async_trait]
pub trait AiModerator: Send + Sync {
    async fn classify(&self, content: &str) -> Result<Verdict, ClassifyError>;
}

pub struct ModerationService<M: AiModerator, C: CounterStore> {
    moderator: M,
    quota: Arc<QuotaTracker<C>>,
}

impl<M: AiModerator, C: CounterStore> ModerationService<M, C> {
    pub fn new(moderator: M, quota: Arc<QuotaTracker<C>>) -> Self {
        Self { moderator, quota }
    }

    /// Classify `content`, preferring the AI moderator while daily budget
    /// remains. Total: always returns a verdict.
    ///
    /// Quota is only charged for definitive AI verdicts - a failed or
    /// unparsable call costs nothing and falls through to the rules.
    pub async fn classify(&self, content: &str) -> Verdict {
        match self.quota.can_proceed().await {
            Ok(true) => match self.moderator.classify(content).await {
                Ok(verdict) => {
                    if let Err(e) = self.quota.record_use().await {
                        tracing::warn!("Failed to record Gemini quota use: {e}");
                    }
                    return verdict;
                }
                Err(e) => {
                    tracing::warn!("AI moderation unavailable, using fallback rules: {e}");
                }
            },
            Ok(false) => {
                tracing::info!("Daily Gemini budget exhausted, using fallback rules");
            }
            Err(e) => {
                tracing::warn!("Quota check failed, using fallback rules: {e}");
            }
        }

        rules::evaluate(content)
    }
}
