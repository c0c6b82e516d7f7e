use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::image_queries;
use crate::models::api::{
    ErrorResponse, ImagePredictionsResponse, PredictionResponse, QueuedResponse, StatsQuery,
    StatsResponse,
};
use crate::services::dispatcher::{DispatchError, DispatchOutcome};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal(e: DispatchError) -> ApiError {
    tracing::error!(error = %e, "Prediction request failed");
    error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// POST /api/v1/predict/{image_id}: run or queue a prediction for a stored image.
pub async fn predict_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let image = image_queries::get_image(&state.db, image_id)
        .await
        .map_err(|e| {
            tracing::error!(image_id = %image_id, error = %e, "Image lookup failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to look up image")
        })?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Image not found"))?;

    let outcome = state
        .dispatcher
        .dispatch(image.id, &image.file_path)
        .await
        .map_err(internal)?;

    Ok(match outcome {
        DispatchOutcome::Queued { job_id } => (
            StatusCode::ACCEPTED,
            Json(QueuedResponse {
                image_id,
                job_id,
                status: "queued".to_string(),
                message: "Prediction job has been queued for processing".to_string(),
            }),
        )
            .into_response(),
        DispatchOutcome::Completed(prediction) | DispatchOutcome::Failed(prediction) => {
            (StatusCode::OK, Json(PredictionResponse::from(&prediction))).into_response()
        }
    })
}

/// GET /api/v1/predictions/{id}
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let prediction = state
        .dispatcher
        .get_prediction(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Prediction not found"))?;

    Ok(Json(PredictionResponse::from(&prediction)))
}

/// GET /api/v1/images/{image_id}/predictions: newest first.
pub async fn get_image_predictions(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> Result<Json<ImagePredictionsResponse>, ApiError> {
    let predictions = state
        .dispatcher
        .list_predictions(image_id)
        .await
        .map_err(internal)?;

    let predictions: Vec<PredictionResponse> =
        predictions.iter().map(PredictionResponse::from).collect();

    Ok(Json(ImagePredictionsResponse {
        image_id,
        count: predictions.len(),
        predictions,
    }))
}

/// GET /api/v1/stats?window_hours=N
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    query
        .validate()
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let stats = state
        .dispatcher
        .get_stats(chrono::Duration::hours(query.window_hours))
        .await
        .map_err(internal)?;

    if let Some(jobs) = &stats.jobs {
        metrics::gauge!("prediction_jobs_pending").set(jobs.pending as f64);
    }

    Ok(Json(StatsResponse {
        window_hours: query.window_hours,
        predictions: stats.predictions,
        jobs: stats.jobs,
    }))
}
