use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::sync::Arc;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::job::{JobStats, JobStatus, PredictionJob, DEFAULT_MAX_RETRIES};

/// Delay before a retried job becomes eligible again.
pub const RETRY_BACKOFF: Duration = Duration::minutes(5);

/// Backing transport of a [`JobQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum QueueTransport {
    #[strum(serialize = "db")]
    Database,
    #[strum(serialize = "rabbitmq")]
    RabbitMq,
    #[strum(serialize = "kafka")]
    Kafka,
}

/// Publish/consume contract shared by every queue transport.
///
/// `claim_pending` is a plain read. The real claim point is
/// `update_status(id, Processing, None)`, which only succeeds while the job
/// is still pending; a second claimer gets [`QueueError::InvalidTransition`].
#[async_trait]
pub trait JobQueue: Send + Sync {
    fn transport(&self) -> QueueTransport;

    /// Creates a pending job eligible immediately.
    async fn publish(&self, image_id: Uuid, image_path: &str) -> Result<Uuid, QueueError>;

    /// Pending jobs with `scheduled_at <= now`, oldest-scheduled first.
    async fn claim_pending(&self, limit: i64) -> Result<Vec<PredictionJob>, QueueError>;

    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), QueueError>;

    /// Moves a failed job back to pending with a delayed schedule, consuming
    /// one retry. Fails with [`QueueError::RetryExhausted`] once the ceiling
    /// is reached.
    async fn retry(&self, job_id: Uuid) -> Result<(), QueueError>;

    async fn stats(&self, window: Duration) -> Result<JobStats, QueueError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<PredictionJob>, QueueError>;
}

/// Builds the queue for a configured transport. Broker transports are not
/// implemented and reject every operation.
pub fn build_job_queue(transport: QueueTransport, pool: PgPool) -> Arc<dyn JobQueue> {
    match transport {
        QueueTransport::Database => Arc::new(PgJobQueue::new(pool)),
        other => Arc::new(UnsupportedQueue::new(other)),
    }
}

/// Checks the arguments of `update_status` that do not depend on stored state.
pub(crate) fn validate_update(
    status: JobStatus,
    error_message: Option<&str>,
) -> Result<(), QueueError> {
    if status == JobStatus::Failed && error_message.map_or(true, str::is_empty) {
        return Err(QueueError::MissingErrorMessage);
    }
    Ok(())
}

/// Explains why a conditional update touched no row.
pub(crate) fn rejected_transition(
    job_id: Uuid,
    current: Option<&PredictionJob>,
    to: JobStatus,
) -> QueueError {
    match current {
        None => QueueError::NotFound(job_id),
        Some(job) => QueueError::InvalidTransition {
            job_id,
            from: job.status,
            to,
        },
    }
}

pub(crate) fn rejected_retry(job_id: Uuid, current: Option<&PredictionJob>) -> QueueError {
    match current {
        Some(job) if job.retries_exhausted() => QueueError::RetryExhausted(job_id),
        other => rejected_transition(job_id, other, JobStatus::Pending),
    }
}

const JOB_COLUMNS: &str = "id, image_id, image_path, status, retry_count, max_retries, \
                           scheduled_at, started_at, completed_at, error_message, created_at";

/// Durable-table transport backed by the `prediction_jobs` table.
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn job_from_row(row: &PgRow) -> Result<PredictionJob, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<JobStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(PredictionJob {
            id: row.try_get("id")?,
            image_id: row.try_get("image_id")?,
            image_path: row.try_get("image_path")?,
            status,
            retry_count: row.try_get("retry_count")?,
            max_retries: row.try_get("max_retries")?,
            scheduled_at: row.try_get("scheduled_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    fn transport(&self) -> QueueTransport {
        QueueTransport::Database
    }

    async fn publish(&self, image_id: Uuid, image_path: &str) -> Result<Uuid, QueueError> {
        let row = sqlx::query(
            r#"
            INSERT INTO prediction_jobs
                (id, image_id, image_path, status, retry_count, max_retries, scheduled_at, created_at)
            VALUES ($1, $2, $3, 'pending', 0, $4, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(image_id)
        .bind(image_path)
        .bind(DEFAULT_MAX_RETRIES)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    async fn claim_pending(&self, limit: i64) -> Result<Vec<PredictionJob>, QueueError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM prediction_jobs
            WHERE status = 'pending' AND scheduled_at <= NOW()
            ORDER BY scheduled_at ASC, created_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| Self::job_from_row(r).map_err(QueueError::from))
            .collect()
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), QueueError> {
        validate_update(status, error_message)?;

        let from: Vec<String> = status
            .allowed_predecessors()
            .iter()
            .map(ToString::to_string)
            .collect();

        let result = sqlx::query(
            r#"
            UPDATE prediction_jobs
            SET status = $1,
                started_at = CASE WHEN $2 THEN NOW() ELSE started_at END,
                completed_at = CASE WHEN $3 THEN NOW() ELSE completed_at END,
                error_message = COALESCE($4, error_message)
            WHERE id = $5 AND status = ANY($6)
            "#,
        )
        .bind(status.to_string())
        .bind(status == JobStatus::Processing)
        .bind(matches!(status, JobStatus::Completed | JobStatus::Failed))
        .bind(error_message.filter(|_| status == JobStatus::Failed))
        .bind(job_id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_job(job_id).await?;
            return Err(rejected_transition(job_id, current.as_ref(), status));
        }
        Ok(())
    }

    async fn retry(&self, job_id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE prediction_jobs
            SET status = 'pending',
                retry_count = retry_count + 1,
                scheduled_at = NOW() + make_interval(secs => $2),
                started_at = NULL,
                completed_at = NULL
            WHERE id = $1 AND status = 'failed' AND retry_count < max_retries
            "#,
        )
        .bind(job_id)
        .bind(RETRY_BACKOFF.num_seconds() as f64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_job(job_id).await?;
            return Err(rejected_retry(job_id, current.as_ref()));
        }
        Ok(())
    }

    async fn stats(&self, window: Duration) -> Result<JobStats, QueueError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'failed' AND retry_count >= max_retries) AS exhausted
            FROM prediction_jobs
            WHERE created_at > $1
            "#,
        )
        .bind(Utc::now() - window)
        .fetch_one(&self.pool)
        .await?;

        Ok(JobStats {
            total: row.try_get("total")?,
            pending: row.try_get("pending")?,
            processing: row.try_get("processing")?,
            completed: row.try_get("completed")?,
            failed: row.try_get("failed")?,
            exhausted: row.try_get("exhausted")?,
        })
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<PredictionJob>, QueueError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM prediction_jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::job_from_row).transpose()?)
    }
}

/// Placeholder for broker transports that have no implementation yet.
/// Every call fails with [`QueueError::TransportUnavailable`].
pub struct UnsupportedQueue {
    transport: QueueTransport,
}

impl UnsupportedQueue {
    pub fn new(transport: QueueTransport) -> Self {
        Self { transport }
    }

    fn unavailable(&self) -> QueueError {
        QueueError::TransportUnavailable(self.transport)
    }
}

#[async_trait]
impl JobQueue for UnsupportedQueue {
    fn transport(&self) -> QueueTransport {
        self.transport
    }

    async fn publish(&self, _image_id: Uuid, _image_path: &str) -> Result<Uuid, QueueError> {
        Err(self.unavailable())
    }

    async fn claim_pending(&self, _limit: i64) -> Result<Vec<PredictionJob>, QueueError> {
        Err(self.unavailable())
    }

    async fn update_status(
        &self,
        _job_id: Uuid,
        _status: JobStatus,
        _error_message: Option<&str>,
    ) -> Result<(), QueueError> {
        Err(self.unavailable())
    }

    async fn retry(&self, _job_id: Uuid) -> Result<(), QueueError> {
        Err(self.unavailable())
    }

    async fn stats(&self, _window: Duration) -> Result<JobStats, QueueError> {
        Err(self.unavailable())
    }

    async fn get_job(&self, _job_id: Uuid) -> Result<Option<PredictionJob>, QueueError> {
        Err(self.unavailable())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("{0} queue transport is not available")]
    TransportUnavailable(QueueTransport),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job {0} has exhausted its retries")]
    RetryExhausted(Uuid),

    #[error("marking a job failed requires an error message")]
    MissingErrorMessage,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
