use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, DateRange, HotelId, RoomId};

use crate::{DateClaim, Hotel, NewHotel, NewRoom, Result, Room};

/// The sole arbiter of date-range exclusivity for rooms.
///
/// All mutation of date claims goes through [`claim`](Self::claim) and
/// [`release`](Self::release). Implementations must be thread-safe.
#[async_trait]
pub trait AvailabilityLedger: Send + Sync {
    /// Atomically claims every date in `range` for the room.
    ///
    /// Returns `Ok(false)` without side effects when the range is reversed,
    /// the room is missing or unavailable, or any date is already claimed.
    /// On success the room's `times_booked` is incremented in the same
    /// atomic unit as the claim batch.
    async fn claim(
        &self,
        room_id: RoomId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<bool>;

    /// Deletes the room's claims within `range`.
    ///
    /// With a `booking_id`, only claims held by that booking are removed.
    /// Idempotent; never touches `times_booked`.
    async fn release(
        &self,
        room_id: RoomId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<()>;

    /// Current claims for a room, ordered by date.
    async fn claimed_dates(&self, room_id: RoomId) -> Result<Vec<DateClaim>>;
}

/// Room and hotel lookup backing the recommendation endpoint.
#[async_trait]
pub trait RoomCatalog: Send + Sync {
    async fn add_hotel(&self, hotel: NewHotel) -> Result<Hotel>;

    async fn list_hotels(&self) -> Result<Vec<Hotel>>;

    /// Adds a room. Fails with `RoomAlreadyExists` on a duplicate
    /// `(hotel_id, number)` and `HotelNotFound` for an unknown hotel.
    async fn add_room(&self, room: NewRoom) -> Result<Room>;

    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>>;

    async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>>;

    /// Available rooms ordered least-booked first, ties broken by lowest id.
    ///
    /// When `range` is given, rooms holding any claim inside it are skipped.
    async fn recommend(
        &self,
        hotel_id: Option<HotelId>,
        range: Option<DateRange>,
    ) -> Result<Vec<Room>>;
}

#[async_trait]
impl<T: AvailabilityLedger + ?Sized> AvailabilityLedger for Arc<T> {
    async fn claim(
        &self,
        room_id: RoomId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<bool> {
        (**self).claim(room_id, range, booking_id).await
    }

    async fn release(
        &self,
        room_id: RoomId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<()> {
        (**self).release(room_id, range, booking_id).await
    }

    async fn claimed_dates(&self, room_id: RoomId) -> Result<Vec<DateClaim>> {
        (**self).claimed_dates(room_id).await
    }
}

#[async_trait]
impl<T: RoomCatalog + ?Sized> RoomCatalog for Arc<T> {
    async fn add_hotel(&self, hotel: NewHotel) -> Result<Hotel> {
        (**self).add_hotel(hotel).await
    }

    async fn list_hotels(&self) -> Result<Vec<Hotel>> {
        (**self).list_hotels().await
    }

    async fn add_room(&self, room: NewRoom) -> Result<Room> {
        (**self).add_room(room).await
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>> {
        (**self).get_room(room_id).await
    }

    async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>> {
        (**self).list_rooms(available_only).await
    }

    async fn recommend(
        &self,
        hotel_id: Option<HotelId>,
        range: Option<DateRange>,
    ) -> Result<Vec<Room>> {
        (**self).recommend(hotel_id, range).await
    }
}

pub(crate) fn record_claim_outcome(room_id: RoomId, range: DateRange, claimed: bool) {
    let outcome = if claimed { "claimed" } else { "rejected" };
    metrics::counter!("ledger_claims_total", "outcome" => outcome).increment(1);
    if claimed {
        tracing::info!(%room_id, %range, "room dates claimed");
    } else {
        tracing::warn!(%room_id, %range, "room dates not claimable");
    }
}

pub(crate) fn record_release(room_id: RoomId, range: DateRange, released: u64) {
    metrics::counter!("ledger_releases_total").increment(1);
    tracing::info!(%room_id, %range, released, "room dates released");
}
