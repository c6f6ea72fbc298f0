use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use pulse_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

/// GET /health
/// An unset trigger secret degrades the service: every cron call would be rejected.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let db = match state.store.ping().await {
        Ok(()) => HealthCheck::healthy("database"),
        Err(e) => HealthCheck::unhealthy("database", e.to_string()),
    };

    let trigger = if state.config.cron_secret.is_empty() {
        HealthCheck::degraded("cron_trigger", "cron_secret is not configured")
    } else {
        HealthCheck::healthy("cron_trigger")
    };

    let response = HealthResponse::healthy("pulse-notification", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![db, trigger]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|h| h.render())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::router;
    use crate::testing::{test_state, InMemorySpikeStore, RecordingMailer};

    #[tokio::test]
    async fn missing_secret_reports_degraded() {
        let state = test_state(Arc::new(InMemorySpikeStore::default()), Arc::new(RecordingMailer::default()), "", None);
        let resp = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["service"], "pulse-notification");
    }
}
