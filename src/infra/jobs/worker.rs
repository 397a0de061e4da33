// In-process moderation queue and runner.
//
// The queue side is an unbounded tokio channel: submission paths push and
// return immediately, so posting never blocks on moderation. The runner
// side spawns one task per job (jobs for different chirps run concurrently,
// with no ordering guarantee between them) and drives the handler with a
// bounded number of attempts, a per-attempt timeout, and a terminal failure
// hook once attempts are exhausted.

use crate::core::jobs::{JobHandler, JobQueue, ModerationJob, QueueError, JOB_TIMEOUT, MAX_ATTEMPTS};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct InProcessQueue {
    sender: mpsc::UnboundedSender<ModerationJob>,
}

impl InProcessQueue {
    /// Create the queue plus the receiver half to hand to [`run_worker`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ModerationJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, job: ModerationJob) -> Result<(), QueueError> {
        self.sender.send(job).map_err(|_| QueueError::Closed)
    }
}

/// Drain the queue until every sender is dropped, spawning one task per job.
pub async fn run_worker<H>(mut receiver: mpsc::UnboundedReceiver<ModerationJob>, handler: Arc<H>)
where
    H: JobHandler + 'static,
{
    while let Some(job) = receiver.recv().await {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            process(handler, job, MAX_ATTEMPTS, JOB_TIMEOUT).await;
        });
    }

    tracing::info!("Moderation queue closed, worker stopping");
}

/// Run one job to completion: retry `handle` up to `max_attempts` times
/// with `timeout` per attempt, then invoke `failed` exactly once.
async fn process<H: JobHandler + ?Sized>(
    handler: Arc<H>,
    job: ModerationJob,
    max_attempts: u32,
    timeout: Duration,
) {
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 1..=max_attempts {
        match tokio::time::timeout(timeout, handler.handle(&job)).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                tracing::warn!(
                    chirp_id = job.chirp_id,
                    attempt,
                    max_attempts,
                    "Moderation job attempt failed: {e:#}"
                );
                last_error = Some(e);
            }
            Err(_) => {
                tracing::warn!(
                    chirp_id = job.chirp_id,
                    attempt,
                    max_attempts,
                    "Moderation job attempt timed out"
                );
                last_error = Some(anyhow!(
                    "attempt timed out after {} seconds",
                    timeout.as_secs()
                ));
            }
        }
    }

    let error = last_error.unwrap_or_else(|| anyhow!("moderation job failed"));
    handler.failed(&job, &error).await;
}
