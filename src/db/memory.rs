//! In-memory [`PredictionStore`] and [`JobQueue`] with the same semantics as
//! the Postgres implementations. Used by tests and local runs without a
//! database.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::prediction_queries::{PredictionStore, StoreError};
use crate::models::job::{JobStats, JobStatus, PredictionJob};
use crate::models::prediction::{Prediction, PredictionStats, PredictionStatus};
use crate::services::queue::{
    rejected_retry, rejected_transition, validate_update, JobQueue, QueueError, QueueTransport,
    RETRY_BACKOFF,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryPredictionStore {
    rows: Arc<Mutex<Vec<Prediction>>>,
}

impl MemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn all(&self) -> Vec<Prediction> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl PredictionStore for MemoryPredictionStore {
    async fn insert(&self, prediction: &Prediction) -> Result<(), StoreError> {
        self.rows.lock().await.push(prediction.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Prediction>, StoreError> {
        Ok(self.rows.lock().await.iter().find(|p| p.id == id).cloned())
    }

    async fn list_for_image(&self, image_id: Uuid) -> Result<Vec<Prediction>, StoreError> {
        let mut found: Vec<Prediction> = self
            .rows
            .lock()
            .await
            .iter()
            .rev()
            .filter(|p| p.image_id == image_id)
            .cloned()
            .collect();
        // Stable sort: same-timestamp rows keep latest-inserted first.
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn stats(&self, window: Duration) -> Result<PredictionStats, StoreError> {
        let cutoff = Utc::now() - window;
        let rows = self.rows.lock().await;
        let mut stats = PredictionStats::default();
        let mut timed = Vec::new();

        for p in rows.iter().filter(|p| p.created_at > cutoff) {
            stats.total += 1;
            match p.status {
                PredictionStatus::Pending => stats.pending += 1,
                PredictionStatus::Processing => stats.processing += 1,
                PredictionStatus::Completed => stats.completed += 1,
                PredictionStatus::Failed => stats.failed += 1,
            }
            if let Some(ms) = p.processing_time_ms.filter(|ms| *ms > 0) {
                timed.push(f64::from(ms));
            }
        }

        if !timed.is_empty() {
            stats.avg_processing_time_ms = Some(timed.iter().sum::<f64>() / timed.len() as f64);
        }
        Ok(stats)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryJobQueue {
    jobs: Arc<Mutex<HashMap<Uuid, PredictionJob>>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the queue with pre-built jobs.
    pub fn with_jobs(jobs: Vec<PredictionJob>) -> Self {
        let map = jobs.into_iter().map(|j| (j.id, j)).collect();
        Self {
            jobs: Arc::new(Mutex::new(map)),
        }
    }

    pub async fn count(&self) -> usize {
        self.jobs.lock().await.len()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    fn transport(&self) -> QueueTransport {
        QueueTransport::Database
    }

    async fn publish(&self, image_id: Uuid, image_path: &str) -> Result<Uuid, QueueError> {
        let job = PredictionJob::new(image_id, image_path);
        let id = job.id;
        self.jobs.lock().await.insert(id, job);
        Ok(id)
    }

    async fn claim_pending(&self, limit: i64) -> Result<Vec<PredictionJob>, QueueError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let now = Utc::now();

        let mut eligible: Vec<PredictionJob> = self
            .jobs
            .lock()
            .await
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.scheduled_at <= now)
            .cloned()
            .collect();
        eligible.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then(a.created_at.cmp(&b.created_at))
        });
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), QueueError> {
        validate_update(status, error_message)?;

        let mut jobs = self.jobs.lock().await;
        let job = match jobs.get_mut(&job_id) {
            Some(job) if job.status.can_transition_to(status) => job,
            other => return Err(rejected_transition(job_id, other.as_deref(), status)),
        };

        let now = Utc::now();
        job.status = status;
        match status {
            JobStatus::Processing => job.started_at = Some(now),
            JobStatus::Completed => job.completed_at = Some(now),
            JobStatus::Failed => {
                job.completed_at = Some(now);
                job.error_message = error_message.map(str::to_string);
            }
            JobStatus::Pending => {}
        }
        Ok(())
    }

    async fn retry(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let job = match jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Failed && !job.retries_exhausted() => job,
            other => return Err(rejected_retry(job_id, other.as_deref())),
        };

        job.status = JobStatus::Pending;
        job.retry_count += 1;
        job.scheduled_at = Utc::now() + RETRY_BACKOFF;
        job.started_at = None;
        job.completed_at = None;
        Ok(())
    }

    async fn stats(&self, window: Duration) -> Result<JobStats, QueueError> {
        let cutoff = Utc::now() - window;
        let jobs = self.jobs.lock().await;
        let mut stats = JobStats::default();

        for job in jobs.values().filter(|j| j.created_at > cutoff) {
            stats.total += 1;
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => {
                    stats.failed += 1;
                    if job.retries_exhausted() {
                        stats.exhausted += 1;
                    }
                }
            }
        }
        Ok(stats)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<PredictionJob>, QueueError> {
        Ok(self.jobs.lock().await.get(&job_id).cloned())
    }
}
