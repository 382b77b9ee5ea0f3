use axum::extract::State;
use axum::response::Json;

use renthive_common::{ApiResponse, AppError};

use crate::models::{AnalyticsParams, AnalyticsReport};
use crate::{cache, AppState};

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    sqlx::query("SELECT 1").execute(&state.db_pool).await?;
    state.redis_service.health_check().await?;
    Ok(Json(ApiResponse::success("healthy")))
}

/// Generate (or serve from cache) the booking analytics report.
///
/// The cache check lives here, not in the assembler: report generation is
/// always write-after-compute, and this layer decides whether to reuse a
/// fingerprint-identical report.
pub async fn get_booking_analytics(
    State(state): State<AppState>,
    Json(params): Json<AnalyticsParams>,
) -> Result<Json<ApiResponse<AnalyticsReport>>, AppError> {
    if let Some(report) = cache::read_report(&state.redis_service, &params).await {
        tracing::debug!("serving booking analytics report from cache");
        return Ok(Json(ApiResponse::success(report)));
    }

    let report = state
        .analytics_service
        .generate_booking_analytics(&params)
        .await?;

    Ok(Json(ApiResponse::success(report)))
}
