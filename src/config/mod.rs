use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use crate::services::queue::QueueTransport;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080"). Unused by the worker.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    /// Base URL of the inference service
    #[serde(default = "default_ml_service_url")]
    pub ml_service_url: String,

    /// Per-call inference timeout
    #[serde(default = "default_ml_service_timeout_secs")]
    pub ml_service_timeout_secs: u64,

    /// Bearer token for the inference service
    #[serde(default)]
    pub ml_service_api_key: Option<String>,

    /// Queue predictions instead of running them inline
    #[serde(default)]
    pub queue_enabled: bool,

    /// Queue transport: "db", "rabbitmq" or "kafka"
    #[serde(default = "default_queue_type")]
    pub queue_type: String,

    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,

    #[serde(default = "default_worker_batch_size")]
    pub worker_batch_size: i64,

    /// Prometheus listener of the worker process
    #[serde(default = "default_worker_metrics_addr")]
    pub worker_metrics_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_connections() -> u32 {
    25
}

fn default_ml_service_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_ml_service_timeout_secs() -> u64 {
    30
}

fn default_queue_type() -> String {
    "db".to_string()
}

fn default_queue_name() -> String {
    "prediction_jobs".to_string()
}

fn default_worker_poll_interval_ms() -> u64 {
    1000
}

fn default_worker_batch_size() -> i64 {
    10
}

fn default_worker_metrics_addr() -> String {
    "0.0.0.0:9091".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn ml_service_timeout(&self) -> Duration {
        Duration::from_secs(self.ml_service_timeout_secs)
    }

    /// Parsed `QUEUE_TYPE`; unknown names are a startup error.
    pub fn queue_transport(&self) -> Result<QueueTransport, strum::ParseError> {
        self.queue_type.parse()
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    pub fn worker_metrics_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.worker_metrics_addr.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig =
            envy::from_iter(vars(&[("DATABASE_URL", "postgres://localhost/cars")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.ml_service_url, "http://localhost:8000");
        assert_eq!(config.ml_service_timeout(), Duration::from_secs(30));
        assert!(config.ml_service_api_key.is_none());
        assert!(!config.queue_enabled);
        assert_eq!(config.queue_type, "db");
        assert_eq!(config.queue_name, "prediction_jobs");
        assert_eq!(config.worker_batch_size, 10);
        assert_eq!(
            config.worker_metrics_addr().unwrap(),
            "0.0.0.0:9091".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_overrides() {
        let config: AppConfig = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://db/cars"),
            ("QUEUE_ENABLED", "true"),
            ("QUEUE_TYPE", "kafka"),
            ("ML_SERVICE_TIMEOUT_SECS", "5"),
            ("ML_SERVICE_API_KEY", "secret"),
        ]))
        .unwrap();
        assert!(config.queue_enabled);
        assert_eq!(config.queue_type, "kafka");
        assert_eq!(config.ml_service_timeout(), Duration::from_secs(5));
        assert_eq!(config.ml_service_api_key.as_deref(), Some("secret"));
        assert_eq!(config.queue_transport().unwrap(), QueueTransport::Kafka);
    }

    #[test]
    fn test_unknown_queue_type() {
        let config: AppConfig = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://db/cars"),
            ("QUEUE_TYPE", "sqs"),
        ]))
        .unwrap();
        assert!(config.queue_transport().is_err());
    }

    #[test]
    fn test_worker_metrics_addr() {
        let config: AppConfig = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://db/cars"),
            ("WORKER_METRICS_ADDR", "127.0.0.1:9400"),
        ]))
        .unwrap();
        assert_eq!(config.worker_metrics_addr().unwrap().port(), 9400);

        let config: AppConfig = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://db/cars"),
            ("WORKER_METRICS_ADDR", "metrics-host"),
        ]))
        .unwrap();
        assert!(config.worker_metrics_addr().is_err());
    }

    #[test]
    fn test_database_url_required() {
        let result: Result<AppConfig, _> = envy::from_iter(vars(&[("QUEUE_ENABLED", "false")]));
        assert!(result.is_err());
    }
}
