use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::prediction::{Cleanliness, Confidence, Integrity, Verdict};

/// Failure reason reported when a call exceeds the client timeout.
pub const TIMEOUT_REASON: &str = "timeout";

/// Classifies a stored image through the external inference service.
///
/// `predict` never returns an error: transport faults, non-200 responses
/// and undecodable bodies all become [`InferenceOutcome::Failure`].
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn predict(&self, image_path: &Path) -> InferenceOutcome;

    /// Liveness of the inference service, independent of predictions.
    async fn health_check(&self) -> Result<(), InferenceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutcome {
    Success(InferenceResult),
    Failure { reason: String },
}

impl InferenceOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scored<T> {
    pub status: T,
    pub confidence: Confidence,
}

/// Body of a successful `POST /api/predict`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceResult {
    pub cleanliness: Scored<Cleanliness>,
    pub integrity: Scored<Integrity>,
    #[serde(default)]
    pub processing_time_ms: i64,
    #[serde(default)]
    pub model_version: String,
}

impl InferenceResult {
    pub fn verdict(&self) -> Verdict {
        Verdict {
            cleanliness: self.cleanliness.status,
            cleanliness_confidence: self.cleanliness.confidence,
            integrity: self.integrity.status,
            integrity_confidence: self.integrity.confidence,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the ML inference service.
pub struct MlClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MlClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, InferenceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(InferenceError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn transport_failure(err: reqwest::Error) -> InferenceOutcome {
        if err.is_timeout() {
            InferenceOutcome::failure(TIMEOUT_REASON)
        } else {
            InferenceOutcome::failure(format!("failed to reach ML service: {err}"))
        }
    }
}

#[async_trait]
impl InferenceClient for MlClient {
    async fn predict(&self, image_path: &Path) -> InferenceOutcome {
        if !image_path.is_absolute() {
            return InferenceOutcome::failure(format!(
                "image path must be absolute: {}",
                image_path.display()
            ));
        }

        let url = format!("{}/api/predict", self.base_url);
        let body = serde_json::json!({ "image_path": image_path.to_string_lossy() });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return Self::transport_failure(e),
        };

        let status = response.status();
        if status != StatusCode::OK {
            let reason = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| format!("ML service returned status {}", status.as_u16()));
            return InferenceOutcome::Failure { reason };
        }

        match response.json::<InferenceResult>().await {
            Ok(result) => InferenceOutcome::Success(result),
            Err(e) if e.is_timeout() => InferenceOutcome::failure(TIMEOUT_REASON),
            Err(e) => InferenceOutcome::failure(format!("failed to decode ML response: {e}")),
        }
    }

    async fn health_check(&self) -> Result<(), InferenceError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(InferenceError::Http)?;

        if response.status() != StatusCode::OK {
            return Err(InferenceError::Unhealthy(response.status().as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ML service health check failed with status {0}")]
    Unhealthy(u16),
}
