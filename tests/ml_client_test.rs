//! Inference client against a mocked ML service.

use serde_json::json;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use car_status::models::prediction::{Cleanliness, Integrity};
use car_status::services::ml_client::{InferenceClient, InferenceOutcome, MlClient};

const IMAGE: &str = "/srv/uploads/9b2e.png";

fn client(server: &MockServer, api_key: Option<&str>) -> MlClient {
    MlClient::new(
        &server.uri(),
        Duration::from_secs(2),
        api_key.map(str::to_string),
    )
    .unwrap()
}

fn prediction_body() -> serde_json::Value {
    json!({
        "cleanliness": { "status": "clean", "confidence": 0.97 },
        "integrity": { "status": "damaged", "confidence": 0.66 },
        "processing_time_ms": 212,
        "model_version": "v3.0.1"
    })
}

fn failure_reason(outcome: InferenceOutcome) -> String {
    match outcome {
        InferenceOutcome::Failure { reason } => reason,
        InferenceOutcome::Success(r) => panic!("expected failure, got {r:?}"),
    }
}

#[tokio::test]
async fn test_predict_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/predict"))
        .and(header("authorization", "Bearer s3cret"))
        .and(body_json(json!({ "image_path": IMAGE })))
        .respond_with(ResponseTemplate::new(200).set_body_json(prediction_body()))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server, Some("s3cret")).predict(Path::new(IMAGE)).await;

    let InferenceOutcome::Success(result) = outcome else {
        panic!("expected success");
    };
    assert_eq!(result.cleanliness.status, Cleanliness::Clean);
    assert_eq!(result.cleanliness.confidence.value(), 0.97);
    assert_eq!(result.integrity.status, Integrity::Damaged);
    assert_eq!(result.integrity.confidence.value(), 0.66);
    assert_eq!(result.processing_time_ms, 212);
    assert_eq!(result.model_version, "v3.0.1");
}

#[tokio::test]
async fn test_non_200_uses_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/predict"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "error": "image is not a car" })),
        )
        .mount(&server)
        .await;

    let outcome = client(&server, None).predict(Path::new(IMAGE)).await;
    assert_eq!(failure_reason(outcome), "image is not a car");
}

#[tokio::test]
async fn test_non_200_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/predict"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let outcome = client(&server, None).predict(Path::new(IMAGE)).await;
    assert_eq!(failure_reason(outcome), "ML service returned status 503");
}

#[tokio::test]
async fn test_undecodable_body_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let outcome = client(&server, None).predict(Path::new(IMAGE)).await;
    assert!(failure_reason(outcome).starts_with("failed to decode ML response"));
}

#[tokio::test]
async fn test_out_of_range_confidence_is_failure() {
    let server = MockServer::start().await;
    let mut body = prediction_body();
    body["integrity"]["confidence"] = json!(1.4);
    Mock::given(method("POST"))
        .and(path("/api/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let outcome = client(&server, None).predict(Path::new(IMAGE)).await;
    assert!(failure_reason(outcome).starts_with("failed to decode ML response"));
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/predict"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(prediction_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = MlClient::new(&server.uri(), Duration::from_millis(200), None).unwrap();
    let outcome = client.predict(Path::new(IMAGE)).await;
    assert_eq!(failure_reason(outcome), "timeout");
}

#[tokio::test]
async fn test_unreachable_service_is_failure() {
    let client = MlClient::new("http://127.0.0.1:9", Duration::from_secs(1), None).unwrap();
    let outcome = client.predict(Path::new(IMAGE)).await;
    let reason = failure_reason(outcome);
    assert!(
        reason.starts_with("failed to reach ML service") || reason == "timeout",
        "unexpected reason: {reason}"
    );
}

#[tokio::test]
async fn test_relative_path_is_rejected_without_a_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(prediction_body()))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = client(&server, None)
        .predict(Path::new("uploads/9b2e.png"))
        .await;
    assert!(failure_reason(outcome).starts_with("image path must be absolute"));
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    assert!(client(&server, None).health_check().await.is_ok());

    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&down)
        .await;
    let err = client(&down, None).health_check().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "ML service health check failed with status 503"
    );
}
