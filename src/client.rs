//! Client-side orchestration: drives per-file uploads against the HTTP API
//! and tracks each file through its lifecycle. The state machine is pure so
//! it can be tested without a server; `ApiClient` is the transport.

use serde::Deserialize;
use thiserror::Error;

use crate::api::handlers::types::OptimizeResponse;
use crate::models::OptimizationSettings;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("illegal transition for '{file}': {from} -> {to}")]
    IllegalTransition {
        file: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("no such file index: {0}")]
    UnknownFile(usize),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Lifecycle of one queued file. Completed and Error are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Error => "error",
        }
    }
}

/// An optimized result held client-side, ready for download or bundling.
#[derive(Debug, Clone)]
pub struct OptimizedResult {
    pub original_size: u64,
    pub optimized_size: u64,
    pub compression_ratio: i32,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct QueuedFile {
    pub name: String,
    pub status: FileStatus,
    pub result: Option<OptimizedResult>,
    pub error: Option<String>,
}

/// Tracks every selected file through `pending -> processing ->
/// {completed | error}`. There is no automatic retry; a failed file stays
/// failed until the caller re-queues it.
#[derive(Debug, Default)]
pub struct UploadQueue {
    files: Vec<QueuedFile>,
}

impl UploadQueue {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: names
                .into_iter()
                .map(|name| QueuedFile {
                    name: name.into(),
                    status: FileStatus::Pending,
                    result: None,
                    error: None,
                })
                .collect(),
        }
    }

    pub fn files(&self) -> &[QueuedFile] {
        &self.files
    }

    fn transition(
        &mut self,
        index: usize,
        expected: FileStatus,
        next: FileStatus,
    ) -> Result<&mut QueuedFile, ClientError> {
        let file = self
            .files
            .get_mut(index)
            .ok_or(ClientError::UnknownFile(index))?;
        if file.status != expected {
            return Err(ClientError::IllegalTransition {
                file: file.name.clone(),
                from: file.status.as_str(),
                to: next.as_str(),
            });
        }
        file.status = next;
        Ok(file)
    }

    pub fn start(&mut self, index: usize) -> Result<(), ClientError> {
        self.transition(index, FileStatus::Pending, FileStatus::Processing)?;
        Ok(())
    }

    pub fn complete(&mut self, index: usize, result: OptimizedResult) -> Result<(), ClientError> {
        let file = self.transition(index, FileStatus::Processing, FileStatus::Completed)?;
        file.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, index: usize, message: String) -> Result<(), ClientError> {
        let file = self.transition(index, FileStatus::Processing, FileStatus::Error)?;
        file.error = Some(message);
        Ok(())
    }

    /// True once every file reached a terminal state.
    pub fn all_settled(&self) -> bool {
        self.files
            .iter()
            .all(|f| matches!(f.status, FileStatus::Completed | FileStatus::Error))
    }

    /// Completed files with their optimized bytes, in queue order.
    pub fn completed(&self) -> impl Iterator<Item = (&str, &OptimizedResult)> {
        self.files.iter().filter_map(|f| match (&f.status, &f.result) {
            (FileStatus::Completed, Some(result)) => Some((f.name.as_str(), result)),
            _ => None,
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin HTTP transport for the optimizer API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Posts one file to `/api/optimize` and decodes the base64 payload.
    pub async fn optimize(
        &self,
        name: &str,
        mime: &str,
        bytes: Vec<u8>,
        settings: &OptimizationSettings,
    ) -> Result<OptimizedResult, ClientError> {
        let settings_json =
            serde_json::to_string(settings).map_err(|e| ClientError::Server(e.to_string()))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("settings", settings_json);

        let response = self
            .http
            .post(format!("{}/api/optimize", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| "unknown server error".to_string());
            return Err(ClientError::Server(message));
        }

        let body: OptimizeResponse = response.json().await?;
        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &body.optimized_image,
        )
        .map_err(|e| ClientError::Server(format!("invalid base64 payload: {e}")))?;

        Ok(OptimizedResult {
            original_size: body.original_size,
            optimized_size: body.optimized_size,
            compression_ratio: body.compression_ratio,
            bytes,
        })
    }

    /// Re-uploads the optimized blobs to `/api/download-zip` and returns the
    /// archive bytes.
    pub async fn download_zip(
        &self,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<u8>, ClientError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, bytes) in files {
            form = form.part("files", reqwest::multipart::Part::bytes(bytes).file_name(name));
        }

        let response = self
            .http
            .post(format!("{}/api/download-zip", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| "unknown server error".to_string());
            return Err(ClientError::Server(message));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Guess the MIME type from a filename extension. Only the formats the API
/// accepts are mapped.
pub fn mime_for_path(path: &std::path::Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("webp") => Some("image/webp"),
        Some("avif") => Some("image/avif"),
        _ => None,
    }
}

/// Submits every queued file in order, one request in flight at a time.
/// A failed file is marked and does not stop the rest.
pub async fn process_queue(
    client: &ApiClient,
    queue: &mut UploadQueue,
    inputs: &[(String, String, Vec<u8>)],
    settings: &OptimizationSettings,
) -> Result<(), ClientError> {
    for (index, (name, mime, bytes)) in inputs.iter().enumerate() {
        queue.start(index)?;

        match client.optimize(name, mime, bytes.clone(), settings).await {
            Ok(result) => queue.complete(index, result)?,
            Err(e) => queue.fail(index, e.to_string())?,
        }
    }
    Ok(())
}
