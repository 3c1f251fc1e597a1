use axum::{
    Json,
    extract::{Multipart, State},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::time::Instant;
use tracing::info;

use crate::api::error::{AppError, from_multipart};
use crate::models::OptimizationSettings;
use crate::services::ledger::NewLedgerEntry;
use crate::services::transcoder::{self, compression_ratio};
use crate::utils::validation::{ValidatedImage, validate_image_upload};

use super::types::*;

/// Everything the response and the ledger need about one finished file.
struct OptimizedFile {
    original_size: u64,
    optimized_size: u64,
    compression_ratio: i32,
    processing_time: u64,
    bytes: Vec<u8>,
}

/// Runs one validated upload through the transcoder on the blocking pool and
/// records the outcome.
async fn optimize_one(
    state: &crate::AppState,
    upload: ValidatedImage,
    settings: &OptimizationSettings,
) -> Result<OptimizedFile, AppError> {
    let original_size = upload.bytes.len();

    let started = Instant::now();
    let task_settings = settings.clone();
    let task_mime = upload.mime.clone();
    let task_bytes = upload.bytes.clone();
    let output = tokio::task::spawn_blocking(move || {
        transcoder::transcode(&task_bytes, &task_mime, &task_settings)
    })
    .await
    .map_err(|e| AppError::Internal(format!("transcode task failed: {e}")))??;

    let processing_time = started.elapsed().as_millis() as u64;
    let optimized_size = output.bytes.len();
    let ratio = compression_ratio(original_size, optimized_size);

    let recorded_format = output
        .format
        .map(|f| f.as_str())
        .unwrap_or("original")
        .to_string();

    let entry = state
        .ledger
        .record(NewLedgerEntry {
            original_name: upload.filename.clone(),
            original_size: original_size as u64,
            optimized_size: optimized_size as u64,
            format: recorded_format,
            quality: settings.quality,
            compression_ratio: ratio,
            processing_time_ms: processing_time,
        })
        .await;

    info!(
        "🖼️  Optimized '{}' ({} -> {} bytes, {}%, entry #{})",
        upload.filename, original_size, optimized_size, ratio, entry.id
    );

    Ok(OptimizedFile {
        original_size: original_size as u64,
        optimized_size: optimized_size as u64,
        compression_ratio: ratio,
        processing_time,
        bytes: output.bytes,
    })
}

#[utoipa::path(
    post,
    path = "/api/optimize",
    responses(
        (status = 200, description = "Image optimized", body = OptimizeResponse),
        (status = 400, description = "No image file provided or invalid settings"),
        (status = 413, description = "File exceeds the size limit"),
        (status = 415, description = "Unsupported image type"),
        (status = 500, description = "Optimization failed")
    ),
    tag = "optimize"
)]
pub async fn optimize_image(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<OptimizeResponse>, AppError> {
    // Capture errors so the remaining multipart stream can be consumed on
    // early rejection
    let result: Result<Json<OptimizeResponse>, AppError> = async {
        let mut upload: Option<ValidatedImage> = None;
        let mut raw_settings: Option<String> = None;

        while let Some(field) = multipart.next_field().await.map_err(from_multipart)? {
            match field.name().unwrap_or_default() {
                "image" => {
                    let filename = field.file_name().unwrap_or("unnamed").to_string();
                    let content_type = field.content_type().map(|s| s.to_string());
                    let data = field.bytes().await.map_err(from_multipart)?;

                    upload = Some(validate_image_upload(
                        &filename,
                        content_type.as_deref(),
                        data,
                        state.config.max_image_size,
                    )?);
                }
                "settings" => {
                    raw_settings = Some(field.text().await.unwrap_or_default());
                }
                _ => {}
            }
        }

        let upload =
            upload.ok_or_else(|| AppError::BadRequest("No image file provided".to_string()))?;
        let settings = OptimizationSettings::from_raw(raw_settings.as_deref())?;

        let result = optimize_one(&state, upload, &settings).await?;

        Ok(Json(OptimizeResponse {
            success: true,
            original_size: result.original_size,
            optimized_size: result.optimized_size,
            compression_ratio: result.compression_ratio,
            processing_time: result.processing_time,
            optimized_image: BASE64.encode(&result.bytes),
        }))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Drain whatever the client is still sending to avoid a TCP reset
            // ("Network error" in browsers) on rejected uploads
            tracing::warn!("Optimize failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/optimize-batch",
    responses(
        (status = 200, description = "Per-file optimization results", body = BatchOptimizeResponse),
        (status = 400, description = "No image files provided"),
        (status = 413, description = "A file exceeds the size limit")
    ),
    tag = "optimize"
)]
pub async fn optimize_batch(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchOptimizeResponse>, AppError> {
    let mut uploads: Vec<(String, Result<ValidatedImage, AppError>)> = Vec::new();
    let mut raw_settings: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(from_multipart)? {
        match field.name().unwrap_or_default() {
            "images" => {
                if uploads.len() >= state.config.max_batch_files {
                    return Err(AppError::BadRequest(format!(
                        "Too many files, at most {} per batch",
                        state.config.max_batch_files
                    )));
                }
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(from_multipart)?;

                let validated = validate_image_upload(
                    &filename,
                    content_type.as_deref(),
                    data,
                    state.config.max_image_size,
                )
                .map_err(AppError::from);
                uploads.push((filename, validated));
            }
            "settings" => {
                raw_settings = Some(field.text().await.unwrap_or_default());
            }
            _ => {}
        }
    }

    if uploads.is_empty() {
        return Err(AppError::BadRequest("No image files provided".to_string()));
    }
    let settings = OptimizationSettings::from_raw(raw_settings.as_deref())?;

    // One file at a time; a failed file becomes a per-file error entry
    // instead of aborting the batch.
    let mut results = Vec::with_capacity(uploads.len());
    for (filename, validated) in uploads {
        let outcome = match validated {
            Ok(upload) => optimize_one(&state, upload, &settings).await,
            Err(e) => Err(e),
        };

        results.push(match outcome {
            Ok(result) => BatchItemResult {
                filename,
                success: true,
                original_size: Some(result.original_size),
                optimized_size: Some(result.optimized_size),
                compression_ratio: Some(result.compression_ratio),
                processing_time: Some(result.processing_time),
                optimized_image: Some(BASE64.encode(&result.bytes)),
                error: None,
            },
            Err(e) => BatchItemResult {
                filename,
                success: false,
                original_size: None,
                optimized_size: None,
                compression_ratio: None,
                processing_time: None,
                optimized_image: None,
                error: Some(batch_error_message(e)),
            },
        });
    }

    Ok(Json(BatchOptimizeResponse { results }))
}

/// Per-file errors go through the same sanitization as top-level responses:
/// validation messages are shown as-is, internal causes are logged and
/// replaced.
fn batch_error_message(err: AppError) -> String {
    match err {
        AppError::BadRequest(msg)
        | AppError::UnsupportedMedia(msg)
        | AppError::PayloadTooLarge(msg) => msg,
        AppError::Optimization(cause) => {
            tracing::error!("Batch item optimization failed: {}", cause);
            "Failed to optimize image".to_string()
        }
        other => {
            tracing::error!("Batch item failed: {}", other);
            "Internal Server Error".to_string()
        }
    }
}
