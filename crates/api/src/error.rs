//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use document_store::StoreError;
use view_engine::ViewError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// View engine error.
    View(ViewError),
    /// Document store error.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::View(err) => view_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn view_error_to_response(err: ViewError) -> (StatusCode, String) {
    match &err {
        ViewError::UnknownView(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ViewError::Store(store_err) => {
            let status = store_status(store_err);
            log_internal(status, &err);
            (status, err.to_string())
        }
        _ => {
            log_internal(StatusCode::INTERNAL_SERVER_ERROR, &err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    let status = store_status(&err);
    log_internal(status, &err);
    (status, err.to_string())
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_internal(status: StatusCode, err: &dyn std::error::Error) {
    if status.is_server_error() {
        tracing::error!(error = %err, "internal server error");
    }
}

impl From<ViewError> for ApiError {
    fn from(err: ViewError) -> Self {
        ApiError::View(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
