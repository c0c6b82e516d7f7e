use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Cleanliness verdict reported by the inference service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Cleanliness {
    Clean,
    Dirty,
}

/// Integrity verdict reported by the inference service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Integrity {
    Intact,
    Damaged,
}

/// Lifecycle status of a prediction row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PredictionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A model confidence, always within `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self, ConfidenceError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfidenceError(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ConfidenceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("confidence {0} is outside [0, 1]")]
pub struct ConfidenceError(pub f64);

/// Verdict pair with confidences, as returned by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub cleanliness: Cleanliness,
    pub cleanliness_confidence: Confidence,
    pub integrity: Integrity,
    pub integrity_confidence: Confidence,
}

/// One persisted inference attempt for an image.
///
/// Build through [`Prediction::pending`], [`Prediction::completed`] or
/// [`Prediction::failed`] so that `verdict`, `error_message` and
/// `completed_at` always agree with `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub id: Uuid,
    pub image_id: Uuid,
    pub verdict: Option<Verdict>,
    pub processing_time_ms: Option<i32>,
    pub model_version: Option<String>,
    pub additional_data: serde_json::Value,
    pub status: PredictionStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Prediction {
    pub fn pending(image_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_id,
            verdict: None,
            processing_time_ms: None,
            model_version: None,
            additional_data: serde_json::json!({}),
            status: PredictionStatus::Pending,
            error_message: None,
            created_at: super::now(),
            completed_at: None,
        }
    }

    pub fn completed(image_id: Uuid, verdict: Verdict, model_version: String) -> Self {
        let now = super::now();
        Self {
            verdict: Some(verdict),
            model_version: Some(model_version).filter(|v| !v.is_empty()),
            status: PredictionStatus::Completed,
            created_at: now,
            completed_at: Some(now),
            ..Self::pending(image_id)
        }
    }

    pub fn failed(image_id: Uuid, reason: impl Into<String>) -> Self {
        let now = super::now();
        Self {
            status: PredictionStatus::Failed,
            error_message: Some(reason.into()),
            created_at: now,
            completed_at: Some(now),
            ..Self::pending(image_id)
        }
    }

    /// Sets the measured processing time; zero is treated as "not measured".
    pub fn with_processing_time(mut self, elapsed_ms: u128) -> Self {
        self.processing_time_ms = match i32::try_from(elapsed_ms) {
            Ok(0) => None,
            Ok(ms) => Some(ms),
            Err(_) => Some(i32::MAX),
        };
        self
    }

    pub fn with_additional_data(mut self, data: serde_json::Value) -> Self {
        self.additional_data = data;
        self
    }

    /// Whether the status-dependent fields agree with `status`.
    pub fn is_consistent(&self) -> bool {
        if self.completed_at.is_some() != self.status.is_terminal() {
            return false;
        }
        match self.status {
            PredictionStatus::Completed => self.verdict.is_some() && self.error_message.is_none(),
            PredictionStatus::Failed => self.error_message.is_some(),
            PredictionStatus::Pending | PredictionStatus::Processing => {
                self.verdict.is_none() && self.error_message.is_none()
            }
        }
    }
}

/// Prediction counts over a time window.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PredictionStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_processing_time_ms: Option<f64>,
}
