use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use image_optimizer_backend::config::AppConfig;
use image_optimizer_backend::services::archive::{README_BODY, README_NAME};
use image_optimizer_backend::services::ledger::MemoryLedger;
use image_optimizer_backend::{AppState, create_app};
use std::io::{Cursor, Read};
use std::sync::Arc;
use tower::ServiceExt;
use zip::ZipArchive;

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

fn test_app_with_config(config: AppConfig) -> axum::Router {
    let state = AppState {
        ledger: Arc::new(MemoryLedger::new(config.ledger_capacity)),
        config,
    };
    create_app(state)
}

fn test_app() -> axum::Router {
    test_app_with_config(AppConfig::development())
}

fn files_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn zip_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/download-zip")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
    let mut file = archive.by_name(name).unwrap();
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();
    data
}

#[tokio::test]
async fn test_zip_round_trip() {
    let app = test_app();
    let body = files_body(&[("a.jpg", b"jpeg payload"), ("b.png", b"png payload")]);

    let response = app.oneshot(zip_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/zip")
    );
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok()),
        Some("attachment; filename=\"optimized-images.zip\"")
    );

    let zip_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes.to_vec())).unwrap();

    // Both uploads plus the README entry
    assert_eq!(archive.len(), 3);
    assert_eq!(read_entry(&mut archive, "a.jpg"), b"jpeg payload");
    assert_eq!(read_entry(&mut archive, "b.png"), b"png payload");
    assert_eq!(read_entry(&mut archive, README_NAME), README_BODY.as_bytes());
}

#[tokio::test]
async fn test_readme_can_be_disabled() {
    let config = AppConfig {
        archive_readme: false,
        ..AppConfig::development()
    };
    let app = test_app_with_config(config);
    let body = files_body(&[("a.jpg", b"payload")]);

    let response = app.oneshot(zip_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let zip_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let archive = ZipArchive::new(Cursor::new(zip_bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 1);
}

#[tokio::test]
async fn test_duplicate_names_last_write_wins() {
    let app = test_app();
    let body = files_body(&[("a.jpg", b"first upload"), ("a.jpg", b"second upload")]);

    let response = app.oneshot(zip_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let zip_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes.to_vec())).unwrap();

    // One entry under the contested name, carrying the later upload
    assert_eq!(archive.len(), 2); // a.jpg + README
    assert_eq!(read_entry(&mut archive, "a.jpg"), b"second upload");
}

#[tokio::test]
async fn test_no_files_returns_400() {
    let app = test_app();
    let body = files_body(&[]);

    let response = app.oneshot(zip_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "No files to archive");
}

#[tokio::test]
async fn test_get_download_zip_returns_405() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/download-zip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_oversized_archive_file_returns_413() {
    let config = AppConfig {
        max_archive_size: 8,
        ..AppConfig::development()
    };
    let app = test_app_with_config(config);
    let body = files_body(&[("big.jpg", b"way more than eight bytes")]);

    let response = app.oneshot(zip_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_entry_names_are_sanitized() {
    let app = test_app();
    let body = files_body(&[("../../escape.jpg", b"payload")]);

    let response = app.oneshot(zip_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let zip_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes.to_vec())).unwrap();
    assert_eq!(read_entry(&mut archive, "escape.jpg"), b"payload");
}
