//! HTTP request handlers

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use std::sync::Arc;

use crate::{
    compare_images,
    core::decode::decode_image,
    error::{AppError, Result},
    models::comparison::Comparison,
    AppState,
};

/// Multipart field carrying the first image
pub const FIRST_FIELD: &str = "file1";
/// Multipart field carrying the second image
pub const SECOND_FIELD: &str = "file2";

/// Liveness probe
pub async fn ping() -> Json<&'static str> {
    Json("pong")
}

/// Score two uploaded images and render their difference heatmap
pub async fn compute_similarity(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Comparison>> {
    let mut first: Option<Bytes> = None;
    let mut second: Option<Bytes> = None;

    // Process the multipart form data
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        let slot = match name.as_str() {
            FIRST_FIELD => &mut first,
            SECOND_FIELD => &mut second,
            _ => {
                log::debug!("Ignoring unexpected multipart field {:?}", name);
                continue;
            }
        };

        log::debug!(
            "Receiving '{}' ({}, {})",
            name,
            field.file_name().unwrap_or("unnamed"),
            field.content_type().unwrap_or("unknown type")
        );
        *slot = Some(field.bytes().await?);
    }

    let first = first.ok_or_else(|| missing_field(FIRST_FIELD))?;
    let second = second.ok_or_else(|| missing_field(SECOND_FIELD))?;

    let timeout = state.config.inference_timeout;
    let task_state = Arc::clone(&state);
    let task = tokio::task::spawn_blocking(move || {
        let max_dimension = task_state.config.max_image_dimension;
        let first = decode_image(FIRST_FIELD, &first, max_dimension)?;
        let second = decode_image(SECOND_FIELD, &second, max_dimension)?;

        compare_images(task_state.encoder.as_ref(), &first, &second)
    });

    let joined = tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| AppError::Timeout(timeout))?;
    let comparison = joined??;

    log::info!(
        "Compared images with {}: similarity {:.4}",
        state.encoder.name(),
        comparison.similarity_score
    );

    Ok(Json(comparison))
}

fn missing_field(name: &str) -> AppError {
    AppError::UploadError(format!("No file provided in field '{}'", name))
}
