use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use pulse_shared::errors::{AppError, AppResult, ErrorCode};
use pulse_shared::types::api::ApiResponse;
use pulse_shared::types::auth::AuthUser;

use crate::range::DateRange;
use crate::services::dashboard::DashboardSummary;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    /// Start date in YYYY-MM-DD format
    pub start: String,
    /// End date in YYYY-MM-DD format
    pub end: String,
}

/// GET /analytics?start=2026-10-01&end=2026-10-31
/// Dashboard data for the authenticated user. Pulls from the provider first
/// when the stored range is incomplete or older than the staleness threshold.
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<ApiResponse<DashboardSummary>>> {
    let range = DateRange::parse(&query.start, &query.end, state.config.max_range_days)
        .map_err(|e| AppError::new(ErrorCode::InvalidDateRange, e.to_string()))?;

    let summary = state.dashboard.load(auth_user.id, range).await?;

    Ok(Json(ApiResponse::ok(summary)))
}
