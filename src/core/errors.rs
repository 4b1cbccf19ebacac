use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::retrieval::RetrievalFailure;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("request timed out")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Only the static apology crosses into the HTTP body; the diagnostic has
/// already been logged at the retrieval boundary.
impl From<RetrievalFailure> for ApiError {
    fn from(failure: RetrievalFailure) -> Self {
        ApiError::Internal(failure.user_message().to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match self {
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::BadRequest(msg) => msg,
            ApiError::Timeout => "Request timed out".to_string(),
            ApiError::Internal(msg) => msg,
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
