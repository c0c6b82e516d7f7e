//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Duration;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use car_status::db::memory::MemoryJobQueue;
use car_status::db::prediction_queries::{PredictionStore, StoreError};
use car_status::models::job::{JobStats, JobStatus, PredictionJob};
use car_status::models::prediction::{Prediction, PredictionStats};
use car_status::services::ml_client::{InferenceClient, InferenceError, InferenceOutcome};
use car_status::services::queue::{JobQueue, QueueError, QueueTransport};

/// Inference client that answers every call with a fixed outcome and
/// records the paths it was asked about.
pub struct FakeInference {
    outcome: InferenceOutcome,
    calls: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

impl FakeInference {
    pub fn new(outcome: InferenceOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for FakeInference {
    async fn predict(&self, image_path: &Path) -> InferenceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(image_path.to_path_buf());
        self.outcome.clone()
    }

    async fn health_check(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

/// Store whose every operation fails, for persistence-error paths.
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl PredictionStore for FailingStore {
    async fn insert(&self, _prediction: &Prediction) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn get(&self, _id: Uuid) -> Result<Option<Prediction>, StoreError> {
        Err(unavailable())
    }

    async fn list_for_image(&self, _image_id: Uuid) -> Result<Vec<Prediction>, StoreError> {
        Err(unavailable())
    }

    async fn stats(&self, _window: Duration) -> Result<PredictionStats, StoreError> {
        Err(unavailable())
    }
}

/// Queue that claims normally but cannot record a job's final status.
pub struct FinalStatusFailingQueue {
    pub inner: MemoryJobQueue,
}

#[async_trait]
impl JobQueue for FinalStatusFailingQueue {
    fn transport(&self) -> QueueTransport {
        QueueTransport::Database
    }

    async fn publish(&self, image_id: Uuid, image_path: &str) -> Result<Uuid, QueueError> {
        self.inner.publish(image_id, image_path).await
    }

    async fn claim_pending(&self, limit: i64) -> Result<Vec<PredictionJob>, QueueError> {
        self.inner.claim_pending(limit).await
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), QueueError> {
        match status {
            JobStatus::Completed | JobStatus::Failed => {
                Err(QueueError::Database(sqlx::Error::PoolTimedOut))
            }
            _ => self.inner.update_status(job_id, status, error_message).await,
        }
    }

    async fn retry(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.inner.retry(job_id).await
    }

    async fn stats(&self, window: Duration) -> Result<JobStats, QueueError> {
        self.inner.stats(window).await
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<PredictionJob>, QueueError> {
        self.inner.get_job(job_id).await
    }
}
