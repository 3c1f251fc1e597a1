use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::Response,
};
use tracing::info;

use crate::api::error::{AppError, from_multipart};
use crate::services::archive::{ArchiveEntry, build_archive};
use crate::utils::validation::{sanitize_filename, validate_file_size};

const ZIP_FILENAME: &str = "optimized-images.zip";

#[utoipa::path(
    post,
    path = "/api/download-zip",
    responses(
        (status = 200, description = "ZIP archive of the uploaded files"),
        (status = 400, description = "No files provided"),
        (status = 413, description = "A file exceeds the size limit"),
        (status = 500, description = "Archive creation failed")
    ),
    tag = "archive"
)]
pub async fn download_zip(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut entries: Vec<ArchiveEntry> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(from_multipart)? {
        if field.name().unwrap_or_default() != "files" {
            continue;
        }

        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let data = field.bytes().await.map_err(from_multipart)?;

        validate_file_size(data.len(), state.config.max_archive_size)
            .map_err(AppError::from)?;
        let name = sanitize_filename(&filename).map_err(AppError::from)?;

        entries.push(ArchiveEntry { name, bytes: data });
    }

    if entries.is_empty() {
        return Err(AppError::BadRequest("No files to archive".to_string()));
    }

    let readme = state.config.archive_readme;
    let file_count = entries.len();
    let zip_bytes =
        tokio::task::spawn_blocking(move || build_archive(&entries, readme))
            .await
            .map_err(|e| AppError::Internal(format!("archive task failed: {e}")))??;

    info!("📦 Bundled {} file(s) into {} bytes", file_count, zip_bytes.len());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{ZIP_FILENAME}\""),
        )
        .header(header::CONTENT_LENGTH, zip_bytes.len())
        .body(Body::from(zip_bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}
