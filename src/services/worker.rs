use std::sync::Arc;
use uuid::Uuid;

use crate::models::job::{JobStatus, PredictionJob};
use crate::models::prediction::PredictionStatus;
use crate::services::dispatcher::{PredictionRunner, UNKNOWN_FAILURE_REASON};
use crate::services::queue::{JobQueue, QueueError};

/// What happened to a single job handed to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    /// Another worker claimed the job first.
    Skipped,
    Completed { prediction_id: Uuid },
    /// Failed and re-scheduled for a later attempt.
    Rescheduled { reason: String },
    /// Failed with no retries left.
    Exhausted { reason: String },
}

/// Executes queued prediction jobs.
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    runner: PredictionRunner,
    batch_size: i64,
}

impl JobWorker {
    pub fn new(queue: Arc<dyn JobQueue>, runner: PredictionRunner, batch_size: i64) -> Self {
        Self {
            queue,
            runner,
            batch_size,
        }
    }

    /// Processes every currently eligible job, up to the batch size.
    /// Returns how many jobs were looked at.
    pub async fn process_batch(&self) -> Result<usize, QueueError> {
        let jobs = self.queue.claim_pending(self.batch_size).await?;
        metrics::gauge!("prediction_jobs_claimed").set(jobs.len() as f64);

        for job in &jobs {
            match self.process_job(job).await {
                Ok(result) => tracing::debug!(job_id = %job.id, result = ?result, "Job handled"),
                Err(e) => tracing::error!(job_id = %job.id, error = %e, "Job handling failed"),
            }
        }
        Ok(jobs.len())
    }

    /// Claims and runs one job. Losing the claim race is not an error.
    pub async fn process_job(&self, job: &PredictionJob) -> Result<JobResult, QueueError> {
        match self
            .queue
            .update_status(job.id, JobStatus::Processing, None)
            .await
        {
            Ok(()) => {}
            Err(QueueError::InvalidTransition { from, .. }) => {
                tracing::debug!(job_id = %job.id, status = %from, "Job already claimed, skipping");
                return Ok(JobResult::Skipped);
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            job_id = %job.id,
            image_id = %job.image_id,
            retry_count = job.retry_count,
            "Processing prediction job"
        );

        let (failure, prediction_id) = match self.runner.run(job.image_id, &job.image_path).await
        {
            Ok(prediction) if prediction.status == PredictionStatus::Completed => {
                self.queue
                    .update_status(job.id, JobStatus::Completed, None)
                    .await
                    .inspect_err(|e| stranded(job, Some(prediction.id), e))?;
                tracing::info!(job_id = %job.id, prediction_id = %prediction.id, "Job completed");
                return Ok(JobResult::Completed {
                    prediction_id: prediction.id,
                });
            }
            Ok(prediction) => (
                prediction
                    .error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| UNKNOWN_FAILURE_REASON.to_string()),
                Some(prediction.id),
            ),
            Err(e) => (format!("failed to record prediction: {e}"), None),
        };

        self.queue
            .update_status(job.id, JobStatus::Failed, Some(&failure))
            .await
            .inspect_err(|e| stranded(job, prediction_id, e))?;

        match self.queue.retry(job.id).await {
            Ok(()) => {
                metrics::counter!("prediction_jobs_retried_total").increment(1);
                tracing::info!(
                    job_id = %job.id,
                    retry_count = job.retry_count + 1,
                    reason = %failure,
                    "Job re-scheduled for retry"
                );
                Ok(JobResult::Rescheduled { reason: failure })
            }
            Err(QueueError::RetryExhausted(_)) => {
                metrics::counter!("prediction_jobs_exhausted_total").increment(1);
                tracing::warn!(
                    job_id = %job.id,
                    max_retries = job.max_retries,
                    reason = %failure,
                    "Job failed after max retries"
                );
                Ok(JobResult::Exhausted { reason: failure })
            }
            Err(e) => Err(e),
        }
    }
}

/// A job left in `processing` after its prediction was recorded needs an
/// operator: nothing reclaims it.
fn stranded(job: &PredictionJob, prediction_id: Option<Uuid>, error: &QueueError) {
    tracing::error!(
        job_id = %job.id,
        image_id = %job.image_id,
        prediction_id = ?prediction_id,
        error = %error,
        "Job stuck in processing, could not record its final status"
    );
}
