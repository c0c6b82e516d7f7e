use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded car image. Storage and upload live outside this service;
/// predictions only need the stored path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarImage {
    pub id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}
