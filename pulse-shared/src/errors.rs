use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::clients::db::StoreError;
use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E5xxx: Notification errors
/// - E7xxx: Analytics errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    ServiceUnavailable,

    // Auth (E1xxx)
    TokenExpired,
    TokenInvalid,
    OAuthError,

    // Notification (E5xxx)
    SpikeRunInProgress,

    // Analytics (E7xxx)
    InvalidDateRange,
    AnalyticsNotConnected,
    UpstreamError,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::ServiceUnavailable => "E0007",

            // Auth
            Self::TokenExpired => "E1004",
            Self::TokenInvalid => "E1005",
            Self::OAuthError => "E1007",

            // Notification
            Self::SpikeRunInProgress => "E5002",

            // Analytics
            Self::InvalidDateRange => "E7001",
            Self::AnalyticsNotConnected => "E7002",
            Self::UpstreamError => "E7003",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::InvalidDateRange | Self::OAuthError => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::SpikeRunInProgress | Self::AnalyticsNotConnected => StatusCode::CONFLICT,
            Self::UpstreamError => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Error code carried by this error, as it would be rendered to a client.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Store(StoreError::Query(diesel::result::Error::NotFound)) => ErrorCode::NotFound,
            AppError::Store(StoreError::Query(_)) => ErrorCode::InternalError,
            AppError::Store(_) => ErrorCode::ServiceUnavailable,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let error_response = match &self {
            AppError::Known { message, details, .. } => {
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                resp
            }
            AppError::Store(StoreError::Query(diesel::result::Error::NotFound)) => {
                ApiErrorResponse::new(code.code(), "resource not found")
            }
            AppError::Store(StoreError::Query(err)) => {
                tracing::error!(error = %err, "database error");
                ApiErrorResponse::new(code.code(), "database error")
            }
            AppError::Store(err) => {
                tracing::error!(error = %err, "store unavailable");
                ApiErrorResponse::new(code.code(), "store unavailable")
            }
        };

        (code.status_code(), Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
