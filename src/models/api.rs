use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobStats;
use super::prediction::{Prediction, PredictionStats};

/// Query string for `GET /api/v1/stats`.
#[derive(Debug, Deserialize, Validate)]
pub struct StatsQuery {
    #[garde(range(min = 1, max = 720))]
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
}

fn default_window_hours() -> i64 {
    24
}

#[derive(Debug, Serialize)]
pub struct VerdictView {
    pub status: String,
    pub confidence: f64,
}

/// Public view of a prediction. Verdicts are only exposed once completed.
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub id: Uuid,
    pub image_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanliness: Option<VerdictView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<VerdictView>,
    pub processing_time_ms: Option<i32>,
    pub model_version: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Prediction> for PredictionResponse {
    fn from(p: &Prediction) -> Self {
        let (cleanliness, integrity) = match &p.verdict {
            Some(v) => (
                Some(VerdictView {
                    status: v.cleanliness.to_string(),
                    confidence: v.cleanliness_confidence.value(),
                }),
                Some(VerdictView {
                    status: v.integrity.to_string(),
                    confidence: v.integrity_confidence.value(),
                }),
            ),
            None => (None, None),
        };

        Self {
            id: p.id,
            image_id: p.image_id,
            cleanliness,
            integrity,
            processing_time_ms: p.processing_time_ms,
            model_version: p.model_version.clone(),
            status: p.status.to_string(),
            error_message: p.error_message.clone(),
            created_at: p.created_at,
            completed_at: p.completed_at,
        }
    }
}

/// Response for a queued dispatch.
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub image_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ImagePredictionsResponse {
    pub image_id: Uuid,
    pub count: usize,
    pub predictions: Vec<PredictionResponse>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub window_hours: i64,
    pub predictions: PredictionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<JobStats>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
