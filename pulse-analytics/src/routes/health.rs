use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use pulse_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

/// GET /health
/// Pings the store.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let db = match state.store.ping().await {
        Ok(()) => HealthCheck::healthy("database"),
        Err(e) => HealthCheck::unhealthy("database", e.to_string()),
    };

    let response = HealthResponse::healthy("pulse-analytics", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![db]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// GET /metrics
/// Prometheus exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|h| h.render())
        .unwrap_or_default()
}
