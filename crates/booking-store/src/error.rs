use common::BookingId;
use thiserror::Error;

use crate::BookingStatus;

/// Errors that can occur when reading or writing bookings.
#[derive(Debug, Error)]
pub enum BookingStoreError {
    /// The booking does not exist.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// A status change that the booking lifecycle does not allow.
    #[error("Illegal booking transition from {from} to {to}")]
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// A stored status value could not be parsed.
    #[error("Unknown booking status: {0}")]
    UnknownStatus(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for booking store operations.
pub type Result<T> = std::result::Result<T, BookingStoreError>;
