use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use pulse_shared::errors::{AppError, AppResult, ErrorCode};
use pulse_shared::middleware::require_bearer_secret;

use crate::services::runner::RunOutcome;
use crate::services::spike_processor::RunSummary;
use crate::AppState;

/// POST /cron/spike-notifications
/// Called by the external scheduler with `Authorization: Bearer <cron_secret>`.
pub async fn run_spike_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<RunSummary>> {
    require_bearer_secret(&headers, &state.config.cron_secret).map_err(|e| {
        tracing::warn!("rejected spike trigger call");
        e
    })?;

    match state.runner.run("http").await? {
        RunOutcome::Completed(summary) => Ok(Json(summary)),
        RunOutcome::AlreadyRunning => Err(AppError::new(
            ErrorCode::SpikeRunInProgress,
            "a spike notification run is already in progress",
        )),
    }
}
