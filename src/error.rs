use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Wire-level taxonomy for everything the dispatcher can reject. Each variant maps to
/// exactly one status code and renders as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("unauthorized")]
    Auth,

    #[error("not found")]
    NotFound,

    #[error("source is temporarily blacklisted")]
    Rejected,

    #[error("transcoder failed to start: {0}")]
    TranscoderStartFailure(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            GatewayError::Auth => (StatusCode::FORBIDDEN, self.to_string()),
            GatewayError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            GatewayError::Rejected => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            GatewayError::TranscoderStartFailure(_) => {
                (StatusCode::REQUEST_TIMEOUT, self.to_string())
            }
            GatewayError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
