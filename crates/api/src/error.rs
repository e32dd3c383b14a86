//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};

/// Message sent to clients in place of infrastructure failure details.
const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Order(order_err) => {
            let status = match order_err {
                OrderError::CustomerNotFound(_)
                | OrderError::BookNotFound(_)
                | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                OrderError::InvalidRequest(_)
                | OrderError::InsufficientStock { .. }
                | OrderError::InvalidStatusTransition { .. } => StatusCode::BAD_REQUEST,
                OrderError::DuplicateIsbn(_) | OrderError::DuplicateEmail(_) => {
                    StatusCode::CONFLICT
                }
            };
            (status, order_err.to_string())
        }
        DomainError::Store(store_err) => {
            // Details stay in the logs.
            tracing::error!(error = %store_err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
