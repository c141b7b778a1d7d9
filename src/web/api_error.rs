use crate::batch::BatchError;
use crate::domain::ValidationError;
use crate::report::ReportError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("the e-mail could not be delivered to any recipient")]
    Undelivered,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Batch(BatchError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Batch(BatchError::Auth(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Report(_) | ApiError::Undelivered => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = %status, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
