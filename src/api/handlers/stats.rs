use axum::{Json, extract::State};

use crate::api::error::AppError;
use crate::services::ledger;

use super::types::StatsResponse;

#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Aggregate optimization statistics", body = StatsResponse)
    ),
    tag = "stats"
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let recent = state.ledger.recent(state.config.stats_window).await;
    let stats = ledger::aggregate(&recent);

    Ok(Json(StatsResponse {
        total_images: stats.total_images as u64,
        total_savings: stats.total_savings,
        average_reduction: stats.average_reduction,
        average_processing_time: stats.average_processing_time,
    }))
}
