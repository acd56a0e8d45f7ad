use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use thiserror::Error;
use ticket_sdk::ServiceError;

use crate::ErrorResponse;

/// Errors surfaced to HTTP callers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("SDP error: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err.root() {
            ServiceError::NotFound(_) => ApiError::NotFound(message),
            ServiceError::Validation(_) => ApiError::Validation(message),
            ServiceError::Configuration(_) => ApiError::Configuration(message),
            _ => ApiError::Upstream(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
            }),
        )
            .into_response()
    }
}
