use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use pulse_shared::errors::{AppError, AppResult, ErrorCode};
use pulse_shared::types::api::ApiResponse;
use pulse_shared::types::auth::{AuthUser, OAuthProvider};

use crate::models::{ConnectionStatus, NewAnalyticsConnection};
use crate::provider::normalize_property_id;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectGoogleRequest {
    /// Authorization code returned to the consent redirect.
    pub code: String,
    pub property_id: String,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub disconnected: bool,
}

/// POST /connections/google
/// Exchanges the consent code for a refresh token and stores the connection.
/// Reconnecting replaces the previous property and token.
pub async fn connect_google(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<ConnectGoogleRequest>,
) -> AppResult<Json<ApiResponse<ConnectionStatus>>> {
    let property_id = normalize_property_id(&req.property_id).ok_or_else(|| {
        AppError::with_details(
            ErrorCode::ValidationError,
            "property_id must be a numeric GA4 property id",
            serde_json::json!({ "property_id": req.property_id }),
        )
    })?;

    let grant = state.provider.exchange_code(&req.code).await.map_err(|e| {
        tracing::warn!(user_id = %auth_user.id, error = %e, "google code exchange failed");
        AppError::new(ErrorCode::OAuthError, "google authorization failed")
    })?;

    let saved = state
        .store
        .save_connection(NewAnalyticsConnection {
            user_id: auth_user.id,
            provider: OAuthProvider::Google.to_string(),
            property_id,
            refresh_token: grant.refresh_token,
            updated_at: Utc::now(),
        })
        .await?;

    tracing::info!(user_id = %auth_user.id, property_id = %saved.property_id, "analytics property connected");

    Ok(Json(ApiResponse::ok(ConnectionStatus::from(Some(saved)))))
}

/// GET /connections/google
pub async fn get_connection(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<ConnectionStatus>>> {
    let conn = state.store.connection(auth_user.id).await?;
    Ok(Json(ApiResponse::ok(ConnectionStatus::from(conn))))
}

/// DELETE /connections/google
/// Cached analytics rows are kept; only the credential is removed.
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<DisconnectResponse>>> {
    let disconnected = state.store.delete_connection(auth_user.id).await?;
    if disconnected {
        tracing::info!(user_id = %auth_user.id, "analytics property disconnected");
    }
    Ok(Json(ApiResponse::ok(DisconnectResponse { disconnected })))
}
