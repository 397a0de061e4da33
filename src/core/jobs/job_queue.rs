// Moderation job contract.
//
// Submission paths enqueue; a runner dequeues and drives a handler with a
// bounded number of attempts and a per-attempt time budget. The queue and
// the runner are infra concerns behind these ports so the pipeline stays
// testable without a real queue.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// The number of times a job may be attempted before the failure hook runs.
pub const MAX_ATTEMPTS: u32 = 3;

/// The maximum number of seconds a single attempt may run.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(60);

/// One unit of moderation work.
///
/// Carries only the chirp id; the handler reloads the row, so a job always
/// moderates the latest message text even when edits raced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationJob {
    pub chirp_id: i64,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand a job to the runner. Returns once the job is durably enqueued.
    async fn enqueue(&self, job: ModerationJob) -> Result<(), QueueError>;
}

/// What the runner drives. `handle` is retried up to [`MAX_ATTEMPTS`] times;
/// `failed` runs exactly once after the last attempt errors out.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &ModerationJob) -> anyhow::Result<()>;

    async fn failed(&self, job: &ModerationJob, error: &anyhow::Error);
}
