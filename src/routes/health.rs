use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
    pub ml_service: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>, start: std::time::Instant) -> Self {
        match result {
            Ok(()) => Self {
                status: "ok".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => Self {
                status: "error".to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Serialize)]
pub struct ProbeResponse {
    pub status: &'static str,
}

/// GET /health: dependency status for the database and inference service.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_start = std::time::Instant::now();
    let database = ComponentHealth::from_result(db::ping(&state.db).await, db_start);

    let ml_start = std::time::Instant::now();
    let ml_service = ComponentHealth::from_result(state.ml.health_check().await, ml_start);

    let all_healthy = database.is_ok() && ml_service.is_ok();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            ml_service,
        },
    };

    (status_code, Json(response))
}

/// GET /ready: ready once the database answers.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    match db::ping(&state.db).await {
        Ok(()) => (StatusCode::OK, Json(ProbeResponse { status: "ready" })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ProbeResponse { status: "not_ready" }),
            )
        }
    }
}

/// GET /live
pub async fn liveness() -> Json<ProbeResponse> {
    Json(ProbeResponse { status: "alive" })
}
