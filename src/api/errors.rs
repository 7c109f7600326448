use crate::analytics::AggregationError;
use crate::service::RefreshError;
use crate::settings::SettingsError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// API error type with HTTP status code mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// The upstream analytics API could not serve the request.
    #[error("Upstream error: {0}")]
    BadGateway(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Settings(e) => {
                tracing::error!(error = %e, "Settings error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not read or write settings".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

impl From<AggregationError> for ApiError {
    fn from(e: AggregationError) -> Self {
        match e {
            AggregationError::ConfigurationInvalid(msg) => Self::BadRequest(msg),
            other @ (AggregationError::AllSitesFailed { .. } | AggregationError::Directory(_)) => {
                Self::BadGateway(other.to_string())
            }
        }
    }
}

impl From<RefreshError> for ApiError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::Settings(e) => Self::Settings(e),
            RefreshError::Aggregation(e) => e.into(),
        }
    }
}
