use chrono::Duration;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::db::prediction_queries::{PredictionStore, StoreError};
use crate::models::job::JobStats;
use crate::models::prediction::{Prediction, PredictionStats, PredictionStatus};
use crate::services::ml_client::{InferenceClient, InferenceOutcome};
use crate::services::queue::{JobQueue, QueueError};

/// Recorded when the inference client fails without saying why.
pub const UNKNOWN_FAILURE_REASON: &str = "inference failed";

/// Runs one inference call and records its outcome as a new prediction row.
///
/// Shared by synchronous dispatch and the queue worker so both paths write
/// identical records.
#[derive(Clone)]
pub struct PredictionRunner {
    inference: Arc<dyn InferenceClient>,
    predictions: Arc<dyn PredictionStore>,
}

impl PredictionRunner {
    pub fn new(inference: Arc<dyn InferenceClient>, predictions: Arc<dyn PredictionStore>) -> Self {
        Self {
            inference,
            predictions,
        }
    }

    /// Calls the inference service and inserts exactly one prediction,
    /// `completed` or `failed`. Only a store failure is an error.
    pub async fn run(&self, image_id: Uuid, image_path: &str) -> Result<Prediction, StoreError> {
        let start = Instant::now();
        let outcome = self.inference.predict(Path::new(image_path)).await;
        let elapsed = start.elapsed();

        metrics::histogram!("inference_duration_seconds").record(elapsed.as_secs_f64());

        let prediction = match outcome {
            InferenceOutcome::Success(result) => {
                metrics::counter!("predictions_completed_total").increment(1);
                Prediction::completed(image_id, result.verdict(), result.model_version.clone())
                    .with_additional_data(serde_json::json!({ "ml_response": result }))
            }
            InferenceOutcome::Failure { reason } => {
                let reason = if reason.trim().is_empty() {
                    UNKNOWN_FAILURE_REASON.to_string()
                } else {
                    reason
                };
                metrics::counter!("predictions_failed_total").increment(1);
                tracing::warn!(image_id = %image_id, reason = %reason, "Inference failed");
                Prediction::failed(image_id, reason.clone())
                    .with_additional_data(serde_json::json!({ "ml_error": reason }))
            }
        }
        .with_processing_time(elapsed.as_millis());

        self.predictions.insert(&prediction).await?;

        tracing::info!(
            prediction_id = %prediction.id,
            image_id = %image_id,
            status = %prediction.status,
            processing_time_ms = ?prediction.processing_time_ms,
            "Prediction recorded"
        );

        Ok(prediction)
    }
}

/// How predictions are dispatched. Chosen once at startup.
#[derive(Clone)]
pub enum DispatchMode {
    /// Call the inference service inline.
    Direct,
    /// Publish a job for the worker.
    Queued(Arc<dyn JobQueue>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Queued { job_id: Uuid },
    Completed(Prediction),
    Failed(Prediction),
}

#[derive(Debug, Clone)]
pub struct DispatchStats {
    pub predictions: PredictionStats,
    pub jobs: Option<JobStats>,
}

/// Entry point for requesting predictions on stored images.
///
/// Holds no mutable state between calls; all coordination goes through the
/// store and the queue.
pub struct Dispatcher {
    mode: DispatchMode,
    runner: PredictionRunner,
    predictions: Arc<dyn PredictionStore>,
}

impl Dispatcher {
    pub fn new(
        mode: DispatchMode,
        inference: Arc<dyn InferenceClient>,
        predictions: Arc<dyn PredictionStore>,
    ) -> Self {
        Self {
            mode,
            runner: PredictionRunner::new(inference, predictions.clone()),
            predictions,
        }
    }

    /// Requests a prediction for an image that is already stored.
    ///
    /// In queued mode a publish failure is returned as-is; there is no
    /// fallback to inline inference.
    pub async fn dispatch(
        &self,
        image_id: Uuid,
        image_path: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        match &self.mode {
            DispatchMode::Queued(queue) => {
                let job_id = queue
                    .publish(image_id, image_path)
                    .await
                    .inspect_err(|e| {
                        tracing::error!(
                            image_id = %image_id,
                            transport = %queue.transport(),
                            error = %e,
                            "Failed to queue prediction job"
                        )
                    })?;

                metrics::counter!("predictions_dispatched_total", "mode" => "queued").increment(1);
                tracing::info!(image_id = %image_id, job_id = %job_id, "Prediction job queued");

                Ok(DispatchOutcome::Queued { job_id })
            }
            DispatchMode::Direct => {
                metrics::counter!("predictions_dispatched_total", "mode" => "direct").increment(1);

                let prediction = self.runner.run(image_id, image_path).await?;
                Ok(match prediction.status {
                    PredictionStatus::Completed => DispatchOutcome::Completed(prediction),
                    _ => DispatchOutcome::Failed(prediction),
                })
            }
        }
    }

    pub async fn get_prediction(&self, id: Uuid) -> Result<Option<Prediction>, DispatchError> {
        Ok(self.predictions.get(id).await?)
    }

    pub async fn list_predictions(&self, image_id: Uuid) -> Result<Vec<Prediction>, DispatchError> {
        Ok(self.predictions.list_for_image(image_id).await?)
    }

    /// Prediction counts, plus job counts when a queue is configured.
    pub async fn get_stats(&self, window: Duration) -> Result<DispatchStats, DispatchError> {
        let predictions = self.predictions.stats(window).await?;
        let jobs = match &self.mode {
            DispatchMode::Queued(queue) => match queue.stats(window).await {
                Ok(stats) => Some(stats),
                Err(QueueError::TransportUnavailable(_)) => None,
                Err(e) => return Err(e.into()),
            },
            DispatchMode::Direct => None,
        };
        Ok(DispatchStats { predictions, jobs })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to queue prediction job: {0}")]
    Queue(#[from] QueueError),

    #[error("Failed to persist prediction: {0}")]
    Store(#[from] StoreError),
}
