pub mod api;
pub mod client;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::ledger::OptimizationLedger;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::optimize::optimize_image,
        api::handlers::optimize::optimize_batch,
        api::handlers::archive::download_zip,
        api::handlers::stats::get_stats,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::OptimizeResponse,
            api::handlers::BatchItemResult,
            api::handlers::BatchOptimizeResponse,
            api::handlers::StatsResponse,
            api::handlers::health::HealthResponse,
            models::OptimizationSettings,
            models::OutputFormat,
        )
    ),
    tags(
        (name = "optimize", description = "Image optimization endpoints"),
        (name = "archive", description = "ZIP packaging endpoint"),
        (name = "stats", description = "Aggregate statistics"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn OptimizationLedger>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    // Multipart framing adds overhead on top of the file payload
    const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/optimize",
            post(api::handlers::optimize::optimize_image).layer(
                axum::extract::DefaultBodyLimit::max(
                    state.config.max_image_size + MULTIPART_OVERHEAD,
                ),
            ),
        )
        .route(
            "/api/optimize-batch",
            post(api::handlers::optimize::optimize_batch).layer(
                axum::extract::DefaultBodyLimit::max(
                    state.config.max_image_size * state.config.max_batch_files
                        + MULTIPART_OVERHEAD,
                ),
            ),
        )
        .route(
            "/api/download-zip",
            post(api::handlers::archive::download_zip).layer(
                axum::extract::DefaultBodyLimit::max(
                    state.config.max_archive_size + MULTIPART_OVERHEAD,
                ),
            ),
        )
        .route("/api/stats", get(api::handlers::stats::get_stats))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
