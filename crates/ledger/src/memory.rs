use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookingId, DateRange, HotelId, RoomId};
use tokio::sync::{Mutex, RwLock};

use crate::store::{record_claim_outcome, record_release};
use crate::{
    AvailabilityLedger, DateClaim, Hotel, LedgerError, NewHotel, NewRoom, Result, Room,
    RoomCatalog,
};

/// A room together with its claimed dates.
///
/// Each entry sits behind its own mutex, which is the atomic unit for a
/// claim batch: claims on different rooms never contend.
#[derive(Debug)]
struct RoomEntry {
    room: Room,
    claims: BTreeMap<NaiveDate, Option<BookingId>>,
}

impl RoomEntry {
    fn is_free(&self, range: &DateRange) -> bool {
        self.claims
            .range(range.start_date..=range.end_date)
            .next()
            .is_none()
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    hotels: BTreeMap<HotelId, Hotel>,
    room_numbers: HashSet<(HotelId, i32)>,
    next_hotel_id: i64,
    next_room_id: i64,
}

/// In-memory ledger and catalog.
///
/// Provides the same contract as the PostgreSQL implementation and is used
/// by tests and by the API server when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    catalog: Arc<RwLock<CatalogState>>,
    rooms: Arc<RwLock<BTreeMap<RoomId, Arc<Mutex<RoomEntry>>>>>,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of claimed dates across all rooms.
    pub async fn claim_count(&self) -> usize {
        let entries: Vec<_> = self.rooms.read().await.values().cloned().collect();
        let mut total = 0;
        for entry in entries {
            total += entry.lock().await.claims.len();
        }
        total
    }

    /// Marks a room as in or out of service.
    pub async fn set_available(&self, room_id: RoomId, available: bool) -> bool {
        match self.entry(room_id).await {
            Some(entry) => {
                entry.lock().await.room.available = available;
                true
            }
            None => false,
        }
    }

    async fn entry(&self, room_id: RoomId) -> Option<Arc<Mutex<RoomEntry>>> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    async fn snapshot_rooms(&self) -> Vec<(Room, Vec<NaiveDate>)> {
        let entries: Vec<_> = self.rooms.read().await.values().cloned().collect();
        let mut rooms = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.lock().await;
            rooms.push((entry.room.clone(), entry.claims.keys().copied().collect()));
        }
        rooms
    }
}

#[async_trait]
impl AvailabilityLedger for InMemoryLedger {
    async fn claim(
        &self,
        room_id: RoomId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<bool> {
        if !range.is_ordered() {
            return Ok(false);
        }

        let Some(entry) = self.entry(room_id).await else {
            record_claim_outcome(room_id, range, false);
            return Ok(false);
        };

        let mut entry = entry.lock().await;
        if !entry.room.available || !entry.is_free(&range) {
            record_claim_outcome(room_id, range, false);
            return Ok(false);
        }

        for date in range.days() {
            entry.claims.insert(date, booking_id);
        }
        entry.room.times_booked += 1;

        record_claim_outcome(room_id, range, true);
        Ok(true)
    }

    async fn release(
        &self,
        room_id: RoomId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<()> {
        if !range.is_ordered() {
            return Ok(());
        }
        let Some(entry) = self.entry(room_id).await else {
            return Ok(());
        };

        let mut entry = entry.lock().await;
        let before = entry.claims.len();
        entry.claims.retain(|date, holder| {
            let in_range = range.contains(*date);
            let owned = booking_id.is_none() || *holder == booking_id;
            !(in_range && owned)
        });
        let released = (before - entry.claims.len()) as u64;

        record_release(room_id, range, released);
        Ok(())
    }

    async fn claimed_dates(&self, room_id: RoomId) -> Result<Vec<DateClaim>> {
        let Some(entry) = self.entry(room_id).await else {
            return Ok(Vec::new());
        };
        let entry = entry.lock().await;
        Ok(entry
            .claims
            .iter()
            .map(|(date, booking_id)| DateClaim {
                room_id,
                date: *date,
                booking_id: *booking_id,
            })
            .collect())
    }
}

#[async_trait]
impl RoomCatalog for InMemoryLedger {
    async fn add_hotel(&self, hotel: NewHotel) -> Result<Hotel> {
        let mut catalog = self.catalog.write().await;
        catalog.next_hotel_id += 1;
        let hotel = Hotel {
            id: HotelId::new(catalog.next_hotel_id),
            name: hotel.name,
            address: hotel.address,
        };
        catalog.hotels.insert(hotel.id, hotel.clone());
        Ok(hotel)
    }

    async fn list_hotels(&self) -> Result<Vec<Hotel>> {
        Ok(self.catalog.read().await.hotels.values().cloned().collect())
    }

    async fn add_room(&self, room: NewRoom) -> Result<Room> {
        let mut catalog = self.catalog.write().await;
        if !catalog.hotels.contains_key(&room.hotel_id) {
            return Err(LedgerError::HotelNotFound(room.hotel_id));
        }
        if !catalog.room_numbers.insert((room.hotel_id, room.number)) {
            return Err(LedgerError::RoomAlreadyExists {
                hotel_id: room.hotel_id,
                number: room.number,
            });
        }

        catalog.next_room_id += 1;
        let room = Room {
            id: RoomId::new(catalog.next_room_id),
            hotel_id: room.hotel_id,
            number: room.number,
            available: room.available,
            times_booked: room.times_booked,
        };
        let entry = RoomEntry {
            room: room.clone(),
            claims: BTreeMap::new(),
        };
        self.rooms
            .write()
            .await
            .insert(room.id, Arc::new(Mutex::new(entry)));
        Ok(room)
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>> {
        match self.entry(room_id).await {
            Some(entry) => Ok(Some(entry.lock().await.room.clone())),
            None => Ok(None),
        }
    }

    async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>> {
        Ok(self
            .snapshot_rooms()
            .await
            .into_iter()
            .map(|(room, _)| room)
            .filter(|room| !available_only || room.available)
            .collect())
    }

    async fn recommend(
        &self,
        hotel_id: Option<HotelId>,
        range: Option<DateRange>,
    ) -> Result<Vec<Room>> {
        let mut rooms: Vec<Room> = self
            .snapshot_rooms()
            .await
            .into_iter()
            .filter(|(room, _)| room.available && hotel_id.is_none_or(|h| room.hotel_id == h))
            .filter(|(_, claimed)| match range {
                Some(range) => !claimed.iter().any(|d| range.contains(*d)),
                None => true,
            })
            .map(|(room, _)| room)
            .collect();

        rooms.sort_by_key(|r| (r.times_booked, r.id));
        Ok(rooms)
    }
}
