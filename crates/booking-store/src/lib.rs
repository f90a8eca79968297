//! Persistent booking records and idempotency keys.
//!
//! A [`Booking`] starts `PENDING` and is moved exactly once to `CONFIRMED` or
//! `CANCELLED`. An [`IdempotencyRecord`] ties a caller-supplied request id to
//! the booking it produced and is only written once that booking is terminal.

pub mod booking;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use booking::{Booking, BookingStatus, IdempotencyRecord, NewBooking, RecordOutcome};
pub use error::{BookingStoreError, Result};
pub use memory::InMemoryBookingStore;
pub use postgres::PostgresBookingStore;
pub use store::BookingStore;
