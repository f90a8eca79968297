//! Saga error types.

use booking_store::BookingStoreError;
use common::{BookingId, RequestId};
use thiserror::Error;

use crate::state::BookingSagaState;

/// Errors that can occur while running or querying booking sagas.
///
/// A refused or failed ledger claim is not an error: it ends the saga with a
/// `CANCELLED` booking.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request carried no usable idempotency key.
    #[error("Request id must not be empty")]
    MissingIdempotencyKey,

    /// The stay dates are out of order or in the past.
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// Booking not found.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// No room could be selected for the request.
    #[error("Room not available: {0}")]
    RoomNotAvailable(String),

    /// The recommendation service could not be reached.
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// An idempotency record points at a booking that does not exist.
    #[error("Inconsistent state: request {request_id} references missing booking {booking_id}")]
    InconsistentState {
        request_id: RequestId,
        booking_id: BookingId,
    },

    /// The saga was asked to move along an edge it does not have.
    #[error("Invalid saga transition from {from} to {to}")]
    InvalidState {
        from: BookingSagaState,
        to: BookingSagaState,
    },

    /// Booking store error.
    #[error("Booking store error: {0}")]
    Store(#[from] BookingStoreError),
}

impl SagaError {
    /// Returns true for errors caused by the request itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SagaError::MissingIdempotencyKey | SagaError::InvalidDateRange(_)
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
