use car_status::{
    config::AppConfig,
    db::{self, prediction_queries::PgPredictionStore},
    services::{
        dispatcher::PredictionRunner,
        ml_client::MlClient,
        queue::{build_job_queue, QueueError},
        worker::JobWorker,
    },
    telemetry,
};
use std::sync::Arc;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting prediction worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let transport = config
        .queue_transport()
        .expect("QUEUE_TYPE must be one of: db, rabbitmq, kafka");
    let metrics_addr = config
        .worker_metrics_addr()
        .expect("WORKER_METRICS_ADDR must be a socket address");

    telemetry::install_worker_exporter(metrics_addr)
        .expect("Failed to install Prometheus metrics exporter");
    tracing::info!(addr = %metrics_addr, "Serving worker metrics");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("Failed to connect to database");

    let ml_client = MlClient::new(
        &config.ml_service_url,
        config.ml_service_timeout(),
        config.ml_service_api_key.clone(),
    )
    .expect("Failed to initialize ML service client");

    let runner = PredictionRunner::new(
        Arc::new(ml_client),
        Arc::new(PgPredictionStore::new(db_pool.clone())),
    );
    let worker = JobWorker::new(
        build_job_queue(transport, db_pool),
        runner,
        config.worker_batch_size,
    );
    let poll_interval = config.worker_poll_interval();

    tracing::info!(
        transport = %transport,
        batch_size = config.worker_batch_size,
        "Worker ready, starting job processing loop"
    );

    loop {
        match worker.process_batch().await {
            Ok(0) => {
                tracing::trace!("No jobs available, sleeping");
                sleep(poll_interval).await;
            }
            Ok(count) => {
                tracing::debug!(count, "Batch processed");
                // A full batch means more jobs are probably waiting.
                if (count as i64) < config.worker_batch_size {
                    sleep(poll_interval).await;
                }
            }
            Err(QueueError::TransportUnavailable(t)) => {
                tracing::error!(transport = %t, "Queue transport is not available, worker exiting");
                std::process::exit(1);
            }
            Err(e) => {
                tracing::error!(error = %e, "Error polling job queue, will retry");
                sleep(poll_interval).await;
            }
        }
    }
}
