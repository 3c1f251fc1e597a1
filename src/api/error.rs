use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::utils::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unsupported Media Type: {0}")]
    UnsupportedMedia(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Optimization failed: {0}")]
    Optimization(String),

    #[error("Archive creation failed: {0}")]
    Archive(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Logs an internal cause under a fresh error id and returns the
    /// sanitized message to put on the wire.
    fn sanitize(cause: &str, public_message: &str) -> (String, String) {
        let error_id = Uuid::new_v4().to_string();
        tracing::error!(error_id = %error_id, "{}: {}", public_message, cause);
        (public_message.to_string(), error_id)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, error_id) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::UnsupportedMedia(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg, None),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg, None),
            AppError::Optimization(cause) => {
                let (msg, id) = Self::sanitize(&cause, "Failed to optimize image");
                (StatusCode::INTERNAL_SERVER_ERROR, msg, Some(id))
            }
            AppError::Archive(cause) => {
                let (msg, id) = Self::sanitize(&cause, "Failed to create ZIP archive");
                (StatusCode::INTERNAL_SERVER_ERROR, msg, Some(id))
            }
            AppError::Internal(cause) => {
                let (msg, id) = Self::sanitize(&cause, "Internal Server Error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg, Some(id))
            }
            AppError::Anyhow(e) => {
                let (msg, id) = Self::sanitize(&format!("{e:?}"), "Internal Server Error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg, Some(id))
            }
        };

        let body = match error_id {
            Some(id) => Json(json!({ "error": message, "errorId": id })),
            None => Json(json!({ "error": message })),
        };

        (status, body).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err.code {
            "FILE_TOO_LARGE" => AppError::PayloadTooLarge(err.message),
            "INVALID_MIME_TYPE" | "NOT_AN_IMAGE" => AppError::UnsupportedMedia(err.message),
            _ => AppError::BadRequest(err.message),
        }
    }
}

impl From<crate::models::SettingsError> for AppError {
    fn from(err: crate::models::SettingsError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<crate::services::transcoder::TranscodeError> for AppError {
    fn from(err: crate::services::transcoder::TranscodeError) -> Self {
        AppError::Optimization(err.to_string())
    }
}

impl From<crate::services::archive::ArchiveError> for AppError {
    fn from(err: crate::services::archive::ArchiveError) -> Self {
        AppError::Archive(err.to_string())
    }
}

/// Maps multipart extraction failures: body-limit overruns become 413,
/// everything else is the caller's fault.
pub fn from_multipart(err: axum::extract::multipart::MultipartError) -> AppError {
    let msg = err.to_string();
    if msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(msg)
    }
}
