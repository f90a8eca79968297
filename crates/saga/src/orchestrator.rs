//! Booking orchestrator: drives one booking request through the saga.

use std::collections::HashMap;
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use booking_store::{Booking, BookingStore, NewBooking, RecordOutcome};
use chrono::{NaiveDate, Utc};
use common::{BookingId, DateRange, HotelId, RequestId, RoomId, UserId};
use ledger::AvailabilityRequest;
use tokio::sync::Mutex;

use crate::confirmation::{ClaimOutcome, ConfirmationClient};
use crate::error::{Result, SagaError};
use crate::retry::RetryPolicy;
use crate::services::{LedgerClient, RoomRecommender};
use crate::state::{BookingSaga, BookingSagaState};

/// A booking request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBooking {
    pub user_id: UserId,
    pub room_id: Option<RoomId>,
    pub hotel_id: Option<HotelId>,
    pub range: DateRange,
    pub auto_select: bool,
    pub request_id: RequestId,
}

impl CreateBooking {
    /// A request for a specific room.
    pub fn for_room(
        user_id: UserId,
        room_id: RoomId,
        range: DateRange,
        request_id: impl Into<RequestId>,
    ) -> Self {
        Self {
            user_id,
            room_id: Some(room_id),
            hotel_id: None,
            range,
            auto_select: false,
            request_id: request_id.into(),
        }
    }

    /// A request that lets the catalog pick the room.
    pub fn auto_select(
        user_id: UserId,
        hotel_id: Option<HotelId>,
        range: DateRange,
        request_id: impl Into<RequestId>,
    ) -> Self {
        Self {
            user_id,
            room_id: None,
            hotel_id,
            range,
            auto_select: true,
            request_id: request_id.into(),
        }
    }
}

/// Longest a live saga can keep its booking `PENDING` under `policy`:
/// one claim plus one compensating release, each with every retry spent.
///
/// A recovery sweep must not touch bookings younger than this.
pub fn max_pending_duration(policy: &RetryPolicy) -> Duration {
    policy.worst_case_duration() * 2
}

/// Checks that the stay has at least one night and does not start before `today`.
pub fn validate_dates(range: DateRange, today: NaiveDate) -> Result<()> {
    if range.start_date >= range.end_date {
        return Err(SagaError::InvalidDateRange(format!(
            "start date {} must be before end date {}",
            range.start_date, range.end_date
        )));
    }
    if range.start_date < today {
        return Err(SagaError::InvalidDateRange(format!(
            "start date {} is in the past",
            range.start_date
        )));
    }
    Ok(())
}

/// Orchestrates booking sagas.
///
/// Requests sharing a request id are serialized within one orchestrator,
/// so an in-process duplicate always replays the first outcome instead of
/// reaching the ledger a second time.
pub struct BookingOrchestrator<B, C, R>
where
    B: BookingStore,
    C: LedgerClient,
    R: RoomRecommender,
{
    store: B,
    confirmation: ConfirmationClient<C>,
    recommender: R,
    in_flight: InFlight,
}

type InFlight = std::sync::Mutex<HashMap<RequestId, Arc<Mutex<()>>>>;

fn lock_in_flight(in_flight: &InFlight) -> MutexGuard<'_, HashMap<RequestId, Arc<Mutex<()>>>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A place in the queue of sagas sharing one request id.
///
/// Dropping it, including when the saga future itself is dropped, removes
/// the map entry once nobody else is queued.
struct InFlightSlot<'a> {
    in_flight: &'a InFlight,
    request_id: RequestId,
    serial: Arc<Mutex<()>>,
}

impl<'a> InFlightSlot<'a> {
    fn join(in_flight: &'a InFlight, request_id: &RequestId) -> Self {
        let serial = lock_in_flight(in_flight)
            .entry(request_id.clone())
            .or_default()
            .clone();
        Self {
            in_flight,
            request_id: request_id.clone(),
            serial,
        }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut in_flight = lock_in_flight(self.in_flight);
        // One reference in the map and ours: nobody else is waiting.
        if Arc::strong_count(&self.serial) <= 2 {
            in_flight.remove(&self.request_id);
        }
    }
}

impl<B, C, R> BookingOrchestrator<B, C, R>
where
    B: BookingStore,
    C: LedgerClient,
    R: RoomRecommender,
{
    /// Creates a new orchestrator.
    pub fn new(store: B, ledger: C, recommender: R, policy: RetryPolicy) -> Self {
        Self {
            store,
            confirmation: ConfirmationClient::new(ledger, policy),
            recommender,
            in_flight: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Gets a reference to the booking store.
    pub fn store(&self) -> &B {
        &self.store
    }

    /// Creates a booking, or replays the outcome recorded for its request id.
    ///
    /// A `CANCELLED` booking is a successful result: the room could not be
    /// claimed and the claim was compensated.
    #[tracing::instrument(
        skip(self, request),
        fields(request_id = %request.request_id, user_id = %request.user_id)
    )]
    pub async fn create_booking(&self, request: CreateBooking) -> Result<Booking> {
        if request.request_id.is_blank() {
            return Err(SagaError::MissingIdempotencyKey);
        }
        validate_dates(request.range, Utc::now().date_naive())?;

        let saga_start = Instant::now();
        let mut saga = BookingSaga::new(request.request_id.clone());

        if let Some(booking) = self.replay(&request.request_id).await? {
            return Ok(booking);
        }

        let slot = InFlightSlot::join(&self.in_flight, &request.request_id);
        let result = {
            let _serialized = slot.serial.lock().await;
            self.run_saga(&request, &mut saga).await
        };
        drop(slot);

        metrics::histogram!("booking_saga_duration_seconds")
            .record(saga_start.elapsed().as_secs_f64());
        result
    }

    async fn run_saga(&self, request: &CreateBooking, saga: &mut BookingSaga) -> Result<Booking> {
        // A duplicate may have finished while this request waited its turn.
        let replayed = self.replay(&request.request_id).await?;
        saga.advance(BookingSagaState::IdempotencyChecked)?;
        if let Some(booking) = replayed {
            saga.advance(BookingSagaState::Recorded)?;
            return Ok(booking);
        }

        let room_id = self.select_room(request).await?;
        saga.select_room(room_id)?;

        let booking = self
            .store
            .create_booking(
                NewBooking::new(request.user_id.clone(), room_id, request.range)
                    .with_request_id(request.request_id.clone()),
            )
            .await?;
        saga.reserve(booking.id)?;
        metrics::counter!("bookings_created_total").increment(1);
        tracing::info!(booking_id = %booking.id, %room_id, range = %request.range, "booking reserved");

        let booking = self.settle(booking, saga).await?;
        self.record(booking, saga).await
    }

    /// Returns the booking recorded for `request_id`, if any.
    async fn replay(&self, request_id: &RequestId) -> Result<Option<Booking>> {
        let Some(record) = self.store.find_idempotency_record(request_id).await? else {
            return Ok(None);
        };

        match self.store.find_booking(record.booking_id).await? {
            Some(booking) => {
                metrics::counter!("booking_idempotent_replays_total").increment(1);
                tracing::info!(
                    booking_id = %booking.id,
                    status = %booking.status,
                    "replaying recorded booking"
                );
                Ok(Some(booking))
            }
            None => {
                tracing::error!(
                    %request_id,
                    booking_id = %record.booking_id,
                    "idempotency record references a missing booking"
                );
                Err(SagaError::InconsistentState {
                    request_id: request_id.clone(),
                    booking_id: record.booking_id,
                })
            }
        }
    }

    async fn select_room(&self, request: &CreateBooking) -> Result<RoomId> {
        if !request.auto_select {
            return request
                .room_id
                .ok_or_else(|| SagaError::RoomNotAvailable("no room requested".to_string()));
        }

        let recommended = self
            .confirmation
            .policy()
            .run("recommend", |_| {
                self.recommender.recommend(request.hotel_id, request.range)
            })
            .await
            .map_err(|e| SagaError::RemoteUnavailable(e.to_string()))?;

        match recommended {
            Some(room_id) => {
                tracing::info!(%room_id, "room auto-selected");
                Ok(room_id)
            }
            None => Err(SagaError::RoomNotAvailable(format!(
                "no room free for {}",
                request.range
            ))),
        }
    }

    /// Claims the booking's dates and moves it to its final status.
    async fn settle(&self, mut booking: Booking, saga: &mut BookingSaga) -> Result<Booking> {
        let mut request = AvailabilityRequest::new(booking.range()).for_booking(booking.id);
        if !saga.request_id().is_blank() {
            request = request.with_request_id(saga.request_id().clone());
        }

        match self.confirmation.claim(booking.room_id, &request).await {
            ClaimOutcome::Confirmed => {
                booking.confirm()?;
                saga.advance(BookingSagaState::Confirmed)?;
                metrics::counter!("bookings_confirmed_total").increment(1);
                tracing::info!(booking_id = %booking.id, "booking confirmed");
            }
            outcome => {
                self.compensate(&booking, &request).await;
                booking.cancel()?;
                saga.advance(BookingSagaState::Cancelled)?;
                metrics::counter!("bookings_cancelled_total", "reason" => outcome.as_str())
                    .increment(1);
                match outcome {
                    ClaimOutcome::Failed(reason) => {
                        tracing::warn!(booking_id = %booking.id, %reason, "booking cancelled")
                    }
                    _ => tracing::info!(booking_id = %booking.id, "booking cancelled, room unavailable"),
                }
            }
        }

        self.store.save_booking(&booking).await?;
        Ok(booking)
    }

    /// Releases whatever the booking may hold. Failure is logged; the
    /// release is idempotent and scoped to this booking, so a later sweep
    /// or administrative release can finish it.
    async fn compensate(&self, booking: &Booking, request: &AvailabilityRequest) {
        if let Err(err) = self.confirmation.release(booking.room_id, request).await {
            tracing::error!(
                booking_id = %booking.id,
                room_id = %booking.room_id,
                error = %err,
                "compensating release failed"
            );
        }
    }

    /// Stores the outcome against the request id.
    ///
    /// If another process recorded the key first, its booking wins and is
    /// returned instead.
    async fn record(&self, booking: Booking, saga: &mut BookingSaga) -> Result<Booking> {
        let request_id = saga.request_id().clone();
        let outcome = self.store.record_outcome(&request_id, booking.id).await?;
        saga.advance(BookingSagaState::Recorded)?;

        match outcome {
            RecordOutcome::Recorded(_) => Ok(booking),
            RecordOutcome::AlreadyRecorded(existing) if existing.booking_id == booking.id => {
                Ok(booking)
            }
            RecordOutcome::AlreadyRecorded(existing) => {
                record_orphan(&booking, &request_id, existing.booking_id);
                self.store
                    .find_booking(existing.booking_id)
                    .await?
                    .ok_or(SagaError::InconsistentState {
                        request_id,
                        booking_id: existing.booking_id,
                    })
            }
        }
    }

    /// Resolves `PENDING` bookings older than `grace` that a crashed run
    /// left behind, and records their outcome.
    ///
    /// A booking whose request id is already recorded for a different
    /// booking is a superseded attempt: it is released and cancelled
    /// without claiming. A booking that cannot be resolved is logged and
    /// skipped.
    ///
    /// `grace` below [`max_pending_duration`] lets the sweep settle a saga
    /// that is still running elsewhere.
    #[tracing::instrument(skip(self))]
    pub async fn recover_pending(&self, grace: Duration) -> Result<Vec<Booking>> {
        let Some(cutoff) = chrono::Duration::from_std(grace)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
        else {
            return Ok(Vec::new());
        };
        let pending = self.store.find_pending_older_than(cutoff).await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!(count = pending.len(), "recovering pending bookings");

        let mut resolved = Vec::with_capacity(pending.len());
        for booking in pending {
            let booking_id = booking.id;
            let recovered = match booking.request_id.clone() {
                Some(request_id) => self.recover_one(booking, request_id).await,
                None => {
                    let mut saga = BookingSaga::resume(RequestId::new(""), &booking);
                    self.settle(booking, &mut saga).await
                }
            };
            match recovered {
                Ok(booking) => resolved.push(booking),
                Err(err) => {
                    metrics::counter!("booking_recovery_failures_total").increment(1);
                    tracing::error!(%booking_id, error = %err, "pending booking not recovered");
                }
            }
        }
        Ok(resolved)
    }

    async fn recover_one(&self, mut booking: Booking, request_id: RequestId) -> Result<Booking> {
        let mut saga = BookingSaga::resume(request_id.clone(), &booking);

        let superseded = self
            .store
            .find_idempotency_record(&request_id)
            .await?
            .is_some_and(|record| record.booking_id != booking.id);

        if superseded {
            let request = AvailabilityRequest::new(booking.range()).for_booking(booking.id);
            self.compensate(&booking, &request).await;
            booking.cancel()?;
            self.store.save_booking(&booking).await?;
            metrics::counter!("bookings_cancelled_total", "reason" => "superseded").increment(1);
            tracing::info!(booking_id = %booking.id, %request_id, "superseded booking cancelled");
            return Ok(booking);
        }

        let booking = self.settle(booking, &mut saga).await?;
        let outcome = self.store.record_outcome(&request_id, booking.id).await?;
        saga.advance(BookingSagaState::Recorded)?;
        if let RecordOutcome::AlreadyRecorded(existing) = outcome
            && existing.booking_id != booking.id
        {
            record_orphan(&booking, &request_id, existing.booking_id);
        }
        Ok(booking)
    }

    /// Gets a booking by id.
    pub async fn get_booking(&self, id: BookingId) -> Result<Booking> {
        self.store
            .find_booking(id)
            .await?
            .ok_or(SagaError::BookingNotFound(id))
    }

    /// All bookings, newest first.
    pub async fn list_bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.store.list_bookings().await?)
    }

    /// A user's bookings, newest first.
    pub async fn list_user_bookings(&self, user_id: &UserId) -> Result<Vec<Booking>> {
        Ok(self.store.list_bookings_for_user(user_id).await?)
    }

    /// Deletes a booking record. Claims it holds in the ledger are left alone.
    #[tracing::instrument(skip(self))]
    pub async fn delete_booking(&self, id: BookingId) -> Result<()> {
        if self.store.delete_booking(id).await? {
            tracing::info!(booking_id = %id, "booking deleted");
            Ok(())
        } else {
            Err(SagaError::BookingNotFound(id))
        }
    }
}

/// A booking that lost its request id to another booking. If it was
/// confirmed, its claims block the room until released by hand.
fn record_orphan(orphan: &Booking, request_id: &RequestId, winner: BookingId) {
    metrics::counter!("booking_orphans_total", "status" => orphan.status.as_str()).increment(1);
    tracing::warn!(
        %request_id,
        orphan = %orphan.id,
        orphan_status = %orphan.status,
        %winner,
        "request id recorded by another booking"
    );
}
