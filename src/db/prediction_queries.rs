use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::models::prediction::{
    Cleanliness, Confidence, Integrity, Prediction, PredictionStats, PredictionStatus, Verdict,
};

/// Durable record of prediction attempts. Rows are only ever inserted;
/// re-running an image adds history instead of overwriting it.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn insert(&self, prediction: &Prediction) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Prediction>, StoreError>;

    /// All predictions for an image, newest first.
    async fn list_for_image(&self, image_id: Uuid) -> Result<Vec<Prediction>, StoreError>;

    async fn stats(&self, window: Duration) -> Result<PredictionStats, StoreError>;
}

const PREDICTION_COLUMNS: &str = "id, image_id, cleanliness_status, cleanliness_confidence, \
    integrity_status, integrity_confidence, processing_time_ms, ml_model_version, \
    additional_data, status, error_message, created_at, completed_at";

pub struct PgPredictionStore {
    pool: PgPool,
}

impl PgPredictionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn prediction_from_row(row: &PgRow) -> Result<Prediction, StoreError> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<PredictionStatus>()
            .map_err(|_| StoreError::Decode(format!("unknown prediction status '{status}'")))?;

        let cleanliness: Option<String> = row.try_get("cleanliness_status")?;
        let cleanliness_confidence: Option<f64> = row.try_get("cleanliness_confidence")?;
        let integrity: Option<String> = row.try_get("integrity_status")?;
        let integrity_confidence: Option<f64> = row.try_get("integrity_confidence")?;

        let verdict = match (cleanliness, cleanliness_confidence, integrity, integrity_confidence) {
            (Some(c), Some(cc), Some(i), Some(ic)) => Some(Verdict {
                cleanliness: c
                    .parse::<Cleanliness>()
                    .map_err(|_| StoreError::Decode(format!("unknown cleanliness '{c}'")))?,
                cleanliness_confidence: Confidence::new(cc)
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
                integrity: i
                    .parse::<Integrity>()
                    .map_err(|_| StoreError::Decode(format!("unknown integrity '{i}'")))?,
                integrity_confidence: Confidence::new(ic)
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
            }),
            _ => None,
        };

        Ok(Prediction {
            id: row.try_get("id")?,
            image_id: row.try_get("image_id")?,
            verdict,
            processing_time_ms: row.try_get("processing_time_ms")?,
            model_version: row.try_get("ml_model_version")?,
            additional_data: row.try_get("additional_data")?,
            status,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

#[async_trait]
impl PredictionStore for PgPredictionStore {
    async fn insert(&self, prediction: &Prediction) -> Result<(), StoreError> {
        let verdict = prediction.verdict.as_ref();

        sqlx::query(
            r#"
            INSERT INTO predictions (
                id, image_id, cleanliness_status, cleanliness_confidence,
                integrity_status, integrity_confidence, processing_time_ms,
                ml_model_version, additional_data, status, error_message,
                created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(prediction.id)
        .bind(prediction.image_id)
        .bind(verdict.map(|v| v.cleanliness.to_string()))
        .bind(verdict.map(|v| v.cleanliness_confidence.value()))
        .bind(verdict.map(|v| v.integrity.to_string()))
        .bind(verdict.map(|v| v.integrity_confidence.value()))
        .bind(prediction.processing_time_ms)
        .bind(prediction.model_version.as_deref())
        .bind(&prediction.additional_data)
        .bind(prediction.status.to_string())
        .bind(prediction.error_message.as_deref())
        .bind(prediction.created_at)
        .bind(prediction.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Prediction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::prediction_from_row).transpose()
    }

    async fn list_for_image(&self, image_id: Uuid) -> Result<Vec<Prediction>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PREDICTION_COLUMNS}
            FROM predictions
            WHERE image_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(image_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::prediction_from_row).collect()
    }

    async fn stats(&self, window: Duration) -> Result<PredictionStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                AVG(processing_time_ms) FILTER (WHERE processing_time_ms > 0)::DOUBLE PRECISION
                    AS avg_processing_time_ms
            FROM predictions
            WHERE created_at > $1
            "#,
        )
        .bind(Utc::now() - window)
        .fetch_one(&self.pool)
        .await?;

        Ok(PredictionStats {
            total: row.try_get("total")?,
            pending: row.try_get("pending")?,
            processing: row.try_get("processing")?,
            completed: row.try_get("completed")?,
            failed: row.try_get("failed")?,
            avg_processing_time_ms: row.try_get("avg_processing_time_ms")?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt prediction row: {0}")]
    Decode(String),
}
