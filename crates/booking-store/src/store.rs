use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, RequestId, UserId};

use crate::{Booking, IdempotencyRecord, NewBooking, RecordOutcome, Result};

/// Storage for bookings and processed request ids.
///
/// Implementations must be thread-safe.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Looks up the record for a request id.
    async fn find_idempotency_record(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<IdempotencyRecord>>;

    /// Records that `request_id` produced `booking_id`.
    ///
    /// A concurrent or earlier record for the same id is not an error: the
    /// existing record is returned as [`RecordOutcome::AlreadyRecorded`].
    async fn record_outcome(
        &self,
        request_id: &RequestId,
        booking_id: BookingId,
    ) -> Result<RecordOutcome>;

    /// Persists a new `Pending` booking and assigns its id.
    async fn create_booking(&self, booking: NewBooking) -> Result<Booking>;

    /// Writes the booking's status over the stored row.
    ///
    /// Fails with `BookingNotFound` when the id is unknown and with
    /// `IllegalTransition` when the stored status cannot move to the new one.
    async fn save_booking(&self, booking: &Booking) -> Result<()>;

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>>;

    /// Deletes a booking and any idempotency record pointing at it.
    ///
    /// Returns false if the booking did not exist.
    async fn delete_booking(&self, id: BookingId) -> Result<bool>;

    /// All bookings, newest first.
    async fn list_bookings(&self) -> Result<Vec<Booking>>;

    /// A user's bookings, newest first.
    async fn list_bookings_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>>;

    /// `Pending` bookings created before `cutoff`, oldest first.
    async fn find_pending_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>>;
}

#[async_trait]
impl<T: BookingStore + ?Sized> BookingStore for Arc<T> {
    async fn find_idempotency_record(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<IdempotencyRecord>> {
        (**self).find_idempotency_record(request_id).await
    }

    async fn record_outcome(
        &self,
        request_id: &RequestId,
        booking_id: BookingId,
    ) -> Result<RecordOutcome> {
        (**self).record_outcome(request_id, booking_id).await
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking> {
        (**self).create_booking(booking).await
    }

    async fn save_booking(&self, booking: &Booking) -> Result<()> {
        (**self).save_booking(booking).await
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        (**self).find_booking(id).await
    }

    async fn delete_booking(&self, id: BookingId) -> Result<bool> {
        (**self).delete_booking(id).await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        (**self).list_bookings().await
    }

    async fn list_bookings_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>> {
        (**self).list_bookings_for_user(user_id).await
    }

    async fn find_pending_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        (**self).find_pending_older_than(cutoff).await
    }
}
