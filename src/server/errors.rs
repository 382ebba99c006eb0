use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::enrichment::{EnrichError, IntakeError};

/// Error body shared by all endpoints: `{"error": ..., "message": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    message: Option<String>,
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            message: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.message {
            Some(message) => json!({ "error": self.error, "message": message }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<EnrichError> for ApiError {
    fn from(err: EnrichError) -> Self {
        match err {
            EnrichError::InvalidChunkSize => Self::bad_request(err.to_string()),
            EnrichError::Upstream { .. } => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: err.to_string(),
                message: Some(err.detail()),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: "An error occurred".to_string(),
                message: Some(other.to_string()),
            },
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        Self::bad_request(err.to_string())
    }
}
