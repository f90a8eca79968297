use common::{HotelId, RoomId};
use thiserror::Error;

/// Errors that can occur when interacting with the availability ledger or catalog.
///
/// A collision with an existing date claim is not an error: `claim` reports
/// it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The referenced room does not exist.
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// The referenced hotel does not exist.
    #[error("Hotel not found: {0}")]
    HotelNotFound(HotelId),

    /// A room with the same number already exists in the hotel.
    #[error("Room {number} already exists in hotel {hotel_id}")]
    RoomAlreadyExists { hotel_id: HotelId, number: i32 },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
