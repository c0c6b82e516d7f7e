use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Registers help text for every metric either binary emits.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "predictions_dispatched_total",
        "Prediction requests dispatched, by mode"
    );
    metrics::describe_counter!(
        "predictions_completed_total",
        "Predictions recorded as completed"
    );
    metrics::describe_counter!("predictions_failed_total", "Predictions recorded as failed");
    metrics::describe_histogram!(
        "inference_duration_seconds",
        "Wall-clock time of inference service calls"
    );
    metrics::describe_gauge!(
        "prediction_jobs_pending",
        "Pending prediction jobs at the last stats query"
    );
    metrics::describe_gauge!(
        "prediction_jobs_claimed",
        "Eligible jobs picked up by the worker's last poll"
    );
    metrics::describe_counter!(
        "prediction_jobs_retried_total",
        "Failed jobs re-scheduled for another attempt"
    );
    metrics::describe_counter!(
        "prediction_jobs_exhausted_total",
        "Jobs left failed after their last retry"
    );
}

/// Installs the global recorder for the worker, serving Prometheus text on
/// its own listener. Must run inside the tokio runtime.
pub fn install_worker_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    Ok(())
}
