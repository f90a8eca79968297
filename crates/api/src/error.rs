//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledger::LedgerError;
use saga::SagaError;

const INTERNAL_MESSAGE: &str = "internal server error";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller did not identify itself.
    Unauthorized(String),
    /// Booking saga error.
    Saga(SagaError),
    /// Ledger or catalog error.
    Ledger(LedgerError),
    /// Internal server error. The detail is logged, never returned.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Ledger(err) => ledger_error_to_response(err),
            ApiError::Internal(msg) => internal(&msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(error = %detail, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        INTERNAL_MESSAGE.to_string(),
    )
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match &err {
        _ if err.is_validation() => (StatusCode::BAD_REQUEST, err.to_string()),
        SagaError::BookingNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SagaError::RoomNotAvailable(_) => (StatusCode::CONFLICT, err.to_string()),
        SagaError::RemoteUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        _ => internal(&err),
    }
}

fn ledger_error_to_response(err: LedgerError) -> (StatusCode, String) {
    match &err {
        LedgerError::RoomNotFound(_) | LedgerError::HotelNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        LedgerError::RoomAlreadyExists { .. } => (StatusCode::CONFLICT, err.to_string()),
        LedgerError::Database(_) | LedgerError::Migration(_) => internal(&err),
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}
