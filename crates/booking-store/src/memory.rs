use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, RequestId, UserId};
use tokio::sync::RwLock;

use crate::{
    Booking, BookingStatus, BookingStore, BookingStoreError, IdempotencyRecord, NewBooking,
    RecordOutcome, Result,
};

#[derive(Debug, Default)]
struct State {
    bookings: BTreeMap<BookingId, Booking>,
    processed: HashMap<RequestId, IdempotencyRecord>,
    next_id: i64,
}

/// In-memory booking store.
///
/// Provides the same contract as the PostgreSQL implementation and is used
/// by tests and by the API server when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }

    /// Returns the number of processed request ids.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.processed.len()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_idempotency_record(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<IdempotencyRecord>> {
        Ok(self.state.read().await.processed.get(request_id).cloned())
    }

    async fn record_outcome(
        &self,
        request_id: &RequestId,
        booking_id: BookingId,
    ) -> Result<RecordOutcome> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.processed.get(request_id) {
            return Ok(RecordOutcome::AlreadyRecorded(existing.clone()));
        }
        if !state.bookings.contains_key(&booking_id) {
            return Err(BookingStoreError::BookingNotFound(booking_id));
        }

        let record = IdempotencyRecord {
            request_id: request_id.clone(),
            booking_id,
            processed_at: Utc::now(),
        };
        state.processed.insert(request_id.clone(), record.clone());
        Ok(RecordOutcome::Recorded(record))
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let booking = Booking {
            id: BookingId::new(state.next_id),
            user_id: booking.user_id,
            room_id: booking.room_id,
            start_date: booking.range.start_date,
            end_date: booking.range.end_date,
            status: BookingStatus::Pending,
            request_id: booking.request_id,
            created_at: Utc::now(),
        };
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn save_booking(&self, booking: &Booking) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .bookings
            .get_mut(&booking.id)
            .ok_or(BookingStoreError::BookingNotFound(booking.id))?;

        if stored.status != booking.status {
            stored.transition_to(booking.status)?;
        }
        Ok(())
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn delete_booking(&self, id: BookingId) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.bookings.remove(&id).is_some();
        if removed {
            state.processed.retain(|_, record| record.booking_id != id);
        }
        Ok(removed)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        let state = self.state.read().await;
        Ok(state.bookings.values().rev().cloned().collect())
    }

    async fn list_bookings_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .rev()
            .filter(|b| &b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_pending_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at < cutoff)
            .cloned()
            .collect())
    }
}
