use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Default retry ceiling for new jobs.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Status of a prediction job in the queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// States a job may be in immediately before moving to `self` through
    /// `update_status`. Failed -> pending only happens through `retry`.
    pub fn allowed_predecessors(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Completed | JobStatus::Failed => &[JobStatus::Processing],
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        next.allowed_predecessors().contains(&self)
    }
}

/// A durable request to run a prediction asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionJob {
    pub id: Uuid,
    pub image_id: Uuid,
    pub image_path: String,
    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PredictionJob {
    /// A fresh pending job, eligible immediately.
    pub fn new(image_id: Uuid, image_path: impl Into<String>) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            image_id,
            image_path: image_path.into(),
            status: JobStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
            created_at: now,
        }
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Job counts over a time window.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    /// Failed jobs whose retry budget is spent.
    pub exhausted: i64,
}
