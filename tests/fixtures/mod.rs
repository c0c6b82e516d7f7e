//! Sample inference results

#![allow(dead_code)]

use car_status::models::prediction::{Cleanliness, Confidence, Integrity};
use car_status::services::ml_client::{InferenceOutcome, InferenceResult, Scored};

pub const IMAGE_PATH: &str = "/var/lib/car-status/uploads/3f1c2a.jpg";

pub fn dirty_intact() -> InferenceResult {
    InferenceResult {
        cleanliness: Scored {
            status: Cleanliness::Dirty,
            confidence: Confidence::new(0.93).unwrap(),
        },
        integrity: Scored {
            status: Integrity::Intact,
            confidence: Confidence::new(0.81).unwrap(),
        },
        processing_time_ms: 140,
        model_version: "car-status-v2.1".to_string(),
    }
}

pub fn success() -> InferenceOutcome {
    InferenceOutcome::Success(dirty_intact())
}

pub fn timeout() -> InferenceOutcome {
    InferenceOutcome::failure("timeout")
}
