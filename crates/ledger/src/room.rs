//! Catalog records and ledger rows.

use chrono::NaiveDate;
use common::{BookingId, DateRange, HotelId, RequestId, RoomId};
use serde::{Deserialize, Serialize};

/// A hotel in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: HotelId,
    pub name: String,
    pub address: String,
}

/// Data for a hotel that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHotel {
    pub name: String,
    #[serde(default)]
    pub address: String,
}

impl NewHotel {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// A room in the catalog.
///
/// The ledger only reads `available` and increments `times_booked`.
/// `times_booked` is a usage counter: release never decrements it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub hotel_id: HotelId,
    pub number: i32,
    pub available: bool,
    pub times_booked: i64,
}

/// Data for a room that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
    pub hotel_id: HotelId,
    pub number: i32,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub times_booked: i64,
}

fn default_available() -> bool {
    true
}

impl NewRoom {
    /// An available room with no booking history.
    pub fn new(hotel_id: HotelId, number: i32) -> Self {
        Self {
            hotel_id,
            number,
            available: true,
            times_booked: 0,
        }
    }

    /// Marks the room as out of service.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Seeds the usage counter.
    pub fn with_times_booked(mut self, times_booked: i64) -> Self {
        self.times_booked = times_booked;
        self
    }
}

/// One claimed date for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateClaim {
    pub room_id: RoomId,
    pub date: NaiveDate,
    /// The booking holding the claim, when the claimant supplied one.
    pub booking_id: Option<BookingId>,
}

/// Body of the confirm-availability and release calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl AvailabilityRequest {
    pub fn new(range: DateRange) -> Self {
        Self {
            start_date: range.start_date,
            end_date: range.end_date,
            booking_id: None,
            request_id: None,
        }
    }

    pub fn for_booking(mut self, booking_id: BookingId) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}
