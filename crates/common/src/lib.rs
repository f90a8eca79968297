//! Shared types for the room booking services.
//!
//! Identifiers are newtypes so a room id can never be passed where a booking
//! id is expected, and [`DateRange`] is the inclusive stay window every other
//! crate speaks in.

pub mod range;
pub mod types;

pub use range::DateRange;
pub use types::{BookingId, HotelId, RequestId, RoomId, UserId};
