use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::image::CarImage;

/// Look up an uploaded image by ID
pub async fn get_image(pool: &PgPool, image_id: Uuid) -> Result<Option<CarImage>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, filename, file_path, mime_type, uploaded_at
        FROM car_images
        WHERE id = $1
        "#,
    )
    .bind(image_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(CarImage {
            id: r.try_get("id")?,
            filename: r.try_get("filename")?,
            file_path: r.try_get("file_path")?,
            mime_type: r.try_get("mime_type")?,
            uploaded_at: r.try_get("uploaded_at")?,
        })
    })
    .transpose()
}
