use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use car_status::{
    app_state::AppState,
    config::AppConfig,
    db::{self, prediction_queries::PgPredictionStore},
    routes,
    services::{
        dispatcher::{DispatchMode, Dispatcher},
        ml_client::{InferenceClient, MlClient},
        queue::build_job_queue,
    },
    telemetry,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");
    let transport = config
        .queue_transport()
        .expect("QUEUE_TYPE must be one of: db, rabbitmq, kafka");

    tracing::info!("Initializing car-status server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    telemetry::describe_metrics();

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!(url = %config.ml_service_url, "Initializing ML service client");
    let ml_client: Arc<dyn InferenceClient> = Arc::new(
        MlClient::new(
            &config.ml_service_url,
            config.ml_service_timeout(),
            config.ml_service_api_key.clone(),
        )
        .expect("Failed to initialize ML service client"),
    );

    let mode = if config.queue_enabled {
        tracing::info!(transport = %transport, queue = %config.queue_name, "Queued dispatch enabled");
        DispatchMode::Queued(build_job_queue(transport, db_pool.clone()))
    } else {
        tracing::info!("Direct dispatch enabled");
        DispatchMode::Direct
    };

    let predictions = Arc::new(PgPredictionStore::new(db_pool.clone()));
    let dispatcher = Dispatcher::new(mode, ml_client.clone(), predictions);
    let state = AppState::new(db_pool, dispatcher, ml_client);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/ready", get(routes::health::readiness))
        .route("/live", get(routes::health::liveness))
        .route(
            "/api/v1/predict/{image_id}",
            post(routes::predictions::predict_image),
        )
        .route(
            "/api/v1/predictions/{id}",
            get(routes::predictions::get_prediction),
        )
        .route(
            "/api/v1/images/{image_id}/predictions",
            get(routes::predictions::get_image_predictions),
        )
        .route("/api/v1/stats", get(routes::predictions::get_stats))
        .with_state(state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
