//! End-to-end booking saga tests against the in-memory stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use booking_store::{
    Booking, BookingStatus, BookingStore, IdempotencyRecord, InMemoryBookingStore, NewBooking,
    RecordOutcome,
};
use chrono::{DateTime, Days, Utc};
use common::{BookingId, DateRange, HotelId, RequestId, RoomId, UserId};
use futures_util::future::join_all;
use ledger::{
    AvailabilityLedger, AvailabilityRequest, InMemoryLedger, NewHotel, NewRoom, RoomCatalog,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use saga::{
    BookingOrchestrator, CreateBooking, InProcessLedgerClient, InProcessRecommender, LedgerClient,
    RemoteError, RetryPolicy, SagaError, max_pending_duration,
};

type Orchestrator<C> = BookingOrchestrator<InMemoryBookingStore, C, InProcessRecommender<InMemoryLedger>>;

/// Counts calls on the way to an in-process ledger.
struct CountingClient {
    inner: InProcessLedgerClient<InMemoryLedger>,
    confirms: AtomicU32,
    releases: AtomicU32,
}

impl CountingClient {
    fn new(ledger: InMemoryLedger) -> Arc<Self> {
        Arc::new(Self {
            inner: InProcessLedgerClient::new(ledger),
            confirms: AtomicU32::new(0),
            releases: AtomicU32::new(0),
        })
    }

    fn confirms(&self) -> u32 {
        self.confirms.load(Ordering::SeqCst)
    }

    fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for CountingClient {
    async fn confirm(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<bool, RemoteError> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        self.inner.confirm(room_id, request).await
    }

    async fn release(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<(), RemoteError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(room_id, request).await
    }
}

/// Claims the dates but never gets its answer back in time.
struct LostResponseClient {
    ledger: InMemoryLedger,
}

#[async_trait]
impl LedgerClient for LostResponseClient {
    async fn confirm(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<bool, RemoteError> {
        self.ledger
            .claim(room_id, request.range(), request.booking_id)
            .await?;
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(true)
    }

    async fn release(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<(), RemoteError> {
        Ok(self
            .ledger
            .release(room_id, request.range(), request.booking_id)
            .await?)
    }
}

struct Seeded {
    ledger: InMemoryLedger,
    store: InMemoryBookingStore,
    grand: HotelId,
    rooms: Vec<RoomId>,
}

/// Two hotels: Grand with 101 (booked 3x), 102 (2x), 103 (out of service),
/// and Lodge with 201 and 202 (never booked).
async fn seeded() -> Seeded {
    let ledger = InMemoryLedger::new();
    let grand = ledger
        .add_hotel(NewHotel::new("Grand", "2 Main St"))
        .await
        .unwrap();
    let lodge = ledger
        .add_hotel(NewHotel::new("Lodge", "3 Hill Rd"))
        .await
        .unwrap();

    let mut rooms = Vec::new();
    for room in [
        NewRoom::new(grand.id, 101).with_times_booked(3),
        NewRoom::new(grand.id, 102).with_times_booked(2),
        NewRoom::new(grand.id, 103).unavailable().with_times_booked(1),
        NewRoom::new(lodge.id, 201),
        NewRoom::new(lodge.id, 202),
    ] {
        rooms.push(ledger.add_room(room).await.unwrap().id);
    }

    Seeded {
        ledger,
        store: InMemoryBookingStore::new(),
        grand: grand.id,
        rooms,
    }
}

fn orchestrator<C: LedgerClient>(seeded: &Seeded, client: C) -> Orchestrator<C> {
    BookingOrchestrator::new(
        seeded.store.clone(),
        client,
        InProcessRecommender::new(seeded.ledger.clone()),
        RetryPolicy::default(),
    )
}

fn stay(offset: u64, nights: u64) -> DateRange {
    let start = Utc::now().date_naive() + Days::new(offset);
    DateRange::new(start, start + Days::new(nights))
}

fn guest() -> UserId {
    UserId::new("guest-1")
}

#[tokio::test]
async fn test_same_request_id_returns_same_booking_without_remote_calls() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = orchestrator(&seeded, client.clone());
    let room = seeded.rooms[0];

    let first = orchestrator
        .create_booking(CreateBooking::for_room(guest(), room, stay(10, 3), "A"))
        .await
        .unwrap();
    let second = orchestrator
        .create_booking(CreateBooking::for_room(guest(), room, stay(10, 3), "A"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.status, BookingStatus::Confirmed);
    assert_eq!(second.status, BookingStatus::Confirmed);
    assert_eq!(client.confirms(), 1);
    assert_eq!(seeded.store.booking_count().await, 1);
}

#[tokio::test]
async fn test_second_request_for_same_dates_is_cancelled_and_leaves_winner_claims() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = orchestrator(&seeded, client.clone());
    let room = seeded.rooms[0];
    let range = stay(10, 3);

    let a = orchestrator
        .create_booking(CreateBooking::for_room(guest(), room, range, "A"))
        .await
        .unwrap();
    let b = orchestrator
        .create_booking(CreateBooking::for_room(UserId::new("guest-2"), room, range, "B"))
        .await
        .unwrap();

    assert_eq!(a.status, BookingStatus::Confirmed);
    assert_eq!(b.status, BookingStatus::Cancelled);
    assert_eq!(client.releases(), 1);

    let claims = seeded.ledger.claimed_dates(room).await.unwrap();
    assert_eq!(claims.len(), 4);
    assert!(claims.iter().all(|c| c.booking_id == Some(a.id)));

    let stored_b = orchestrator.get_booking(b.id).await.unwrap();
    assert_eq!(stored_b.status, BookingStatus::Cancelled);
    let room = seeded.ledger.get_room(room).await.unwrap().unwrap();
    assert_eq!(room.times_booked, 4);
}

#[tokio::test]
async fn test_blank_request_id_is_rejected_before_any_work() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = orchestrator(&seeded, client.clone());

    for key in ["", "   "] {
        let err = orchestrator
            .create_booking(CreateBooking::for_room(
                guest(),
                seeded.rooms[0],
                stay(10, 2),
                key,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::MissingIdempotencyKey));
        assert!(err.is_validation());
    }

    assert_eq!(client.confirms(), 0);
    assert_eq!(seeded.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_past_or_empty_stays_are_rejected() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = orchestrator(&seeded, client.clone());
    let today = Utc::now().date_naive();

    let past = DateRange::new(today - Days::new(2), today + Days::new(1));
    let err = orchestrator
        .create_booking(CreateBooking::for_room(guest(), seeded.rooms[0], past, "P"))
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::InvalidDateRange(_)));

    let empty = DateRange::new(today + Days::new(3), today + Days::new(3));
    let err = orchestrator
        .create_booking(CreateBooking::for_room(guest(), seeded.rooms[0], empty, "Q"))
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::InvalidDateRange(_)));

    assert_eq!(client.confirms(), 0);
    assert_eq!(seeded.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_unavailable_room_is_cancelled_without_claims() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = orchestrator(&seeded, client.clone());
    let closed = seeded.rooms[2];

    let booking = orchestrator
        .create_booking(CreateBooking::for_room(guest(), closed, stay(5, 2), "C"))
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(client.confirms(), 1);
    assert!(seeded.ledger.claimed_dates(closed).await.unwrap().is_empty());

    // The cancellation is recorded and replayed.
    let again = orchestrator
        .create_booking(CreateBooking::for_room(guest(), closed, stay(5, 2), "C"))
        .await
        .unwrap();
    assert_eq!(again.id, booking.id);
    assert_eq!(again.status, BookingStatus::Cancelled);
    assert_eq!(client.confirms(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_claim_is_compensated() {
    let seeded = seeded().await;
    let client = LostResponseClient {
        ledger: seeded.ledger.clone(),
    };
    let orchestrator = orchestrator(&seeded, client);
    let room = seeded.rooms[3];

    let booking = orchestrator
        .create_booking(CreateBooking::for_room(guest(), room, stay(20, 2), "T"))
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert!(seeded.ledger.claimed_dates(room).await.unwrap().is_empty());

    // The claim that went through still counted; release never decrements.
    let room = seeded.ledger.get_room(room).await.unwrap().unwrap();
    assert_eq!(room.times_booked, 1);

    let record = seeded
        .store
        .find_idempotency_record(&RequestId::new("T"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.booking_id, booking.id);
}

#[tokio::test]
async fn test_auto_select_prefers_least_booked_then_lowest_id() {
    let seeded = seeded().await;
    let orchestrator = orchestrator(&seeded, CountingClient::new(seeded.ledger.clone()));
    let range = stay(15, 2);

    let first = orchestrator
        .create_booking(CreateBooking::auto_select(guest(), None, range, "S1"))
        .await
        .unwrap();
    assert_eq!(first.room_id, seeded.rooms[3]);
    assert_eq!(first.status, BookingStatus::Confirmed);

    // Room 201 is now taken for these dates.
    let second = orchestrator
        .create_booking(CreateBooking::auto_select(guest(), None, range, "S2"))
        .await
        .unwrap();
    assert_eq!(second.room_id, seeded.rooms[4]);

    let in_grand = orchestrator
        .create_booking(CreateBooking::auto_select(
            guest(),
            Some(seeded.grand),
            range,
            "S3",
        ))
        .await
        .unwrap();
    assert_eq!(in_grand.room_id, seeded.rooms[1]);
}

#[tokio::test]
async fn test_auto_select_without_candidates_fails() {
    let seeded = seeded().await;
    let orchestrator = orchestrator(&seeded, CountingClient::new(seeded.ledger.clone()));

    let err = orchestrator
        .create_booking(CreateBooking::auto_select(
            guest(),
            Some(HotelId::new(404)),
            stay(15, 2),
            "S",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::RoomNotAvailable(_)));
    assert_eq!(seeded.store.booking_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicates_run_the_saga_once() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = Arc::new(orchestrator(&seeded, client.clone()));
    let room = seeded.rooms[0];
    let range = stay(40, 2);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .create_booking(CreateBooking::for_room(guest(), room, range, "D"))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let bookings: Vec<Booking> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(bookings.iter().all(|b| b.id == bookings[0].id));
    assert!(bookings.iter().all(|b| b.status == BookingStatus::Confirmed));
    assert_eq!(client.confirms(), 1);
    assert_eq!(seeded.store.booking_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_requests_book_one_winner() {
    let seeded = seeded().await;
    let orchestrator = Arc::new(orchestrator(
        &seeded,
        CountingClient::new(seeded.ledger.clone()),
    ));
    let room = seeded.rooms[4];
    let range = stay(50, 3);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .create_booking(CreateBooking::for_room(
                        UserId::new(format!("guest-{i}")),
                        room,
                        range,
                        RequestId::new(format!("R{i}")),
                    ))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let bookings: Vec<Booking> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let confirmed: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Confirmed)
        .collect();
    assert_eq!(confirmed.len(), 1);

    let claims = seeded.ledger.claimed_dates(room).await.unwrap();
    assert_eq!(claims.len(), 4);
    assert!(claims.iter().all(|c| c.booking_id == Some(confirmed[0].id)));
}

#[tokio::test]
async fn test_recovery_resolves_stale_pending_bookings() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = orchestrator(&seeded, client.clone());
    let room = seeded.rooms[1];
    let range = stay(25, 2);

    // A run that crashed right after persisting the booking.
    let stranded = seeded
        .store
        .create_booking(
            NewBooking::new(guest(), room, range).with_request_id(RequestId::new("crashed")),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let resolved = orchestrator.recover_pending(Duration::ZERO).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, stranded.id);
    assert_eq!(resolved[0].status, BookingStatus::Confirmed);

    // The caller's retry now replays the recovered outcome.
    let retried = orchestrator
        .create_booking(CreateBooking::for_room(guest(), room, range, "crashed"))
        .await
        .unwrap();
    assert_eq!(retried.id, stranded.id);
    assert_eq!(client.confirms(), 1);

    assert!(
        orchestrator
            .recover_pending(Duration::ZERO)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_recovery_cancels_superseded_attempts() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = orchestrator(&seeded, client.clone());
    let room = seeded.rooms[0];
    let range = stay(30, 2);

    let stranded = seeded
        .store
        .create_booking(NewBooking::new(guest(), room, range).with_request_id(RequestId::new("X")))
        .await
        .unwrap();
    let retried = orchestrator
        .create_booking(CreateBooking::for_room(guest(), room, range, "X"))
        .await
        .unwrap();
    assert_ne!(retried.id, stranded.id);
    assert_eq!(retried.status, BookingStatus::Confirmed);
    tokio::time::sleep(Duration::from_millis(5)).await;

    let resolved = orchestrator.recover_pending(Duration::ZERO).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].status, BookingStatus::Cancelled);
    assert_eq!(client.confirms(), 1);

    let claims = seeded.ledger.claimed_dates(room).await.unwrap();
    assert_eq!(claims.len(), 3);
    assert!(claims.iter().all(|c| c.booking_id == Some(retried.id)));
}

#[tokio::test]
async fn test_queries_and_delete() {
    let seeded = seeded().await;
    let orchestrator = orchestrator(&seeded, CountingClient::new(seeded.ledger.clone()));

    let mine = orchestrator
        .create_booking(CreateBooking::for_room(guest(), seeded.rooms[0], stay(5, 1), "Q1"))
        .await
        .unwrap();
    let theirs = orchestrator
        .create_booking(CreateBooking::for_room(
            UserId::new("guest-2"),
            seeded.rooms[1],
            stay(5, 1),
            "Q2",
        ))
        .await
        .unwrap();

    assert_eq!(orchestrator.list_bookings().await.unwrap().len(), 2);
    let listed = orchestrator.list_user_bookings(&guest()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, mine.id);

    orchestrator.delete_booking(theirs.id).await.unwrap();
    assert!(matches!(
        orchestrator.get_booking(theirs.id).await,
        Err(SagaError::BookingNotFound(_))
    ));
    assert!(matches!(
        orchestrator.delete_booking(theirs.id).await,
        Err(SagaError::BookingNotFound(_))
    ));
}

/// A store whose idempotency table points at a booking it cannot find.
struct DanglingRecordStore;

#[async_trait]
impl BookingStore for DanglingRecordStore {
    async fn find_idempotency_record(
        &self,
        request_id: &RequestId,
    ) -> booking_store::Result<Option<IdempotencyRecord>> {
        Ok(Some(IdempotencyRecord {
            request_id: request_id.clone(),
            booking_id: BookingId::new(99),
            processed_at: Utc::now(),
        }))
    }

    async fn record_outcome(
        &self,
        _request_id: &RequestId,
        _booking_id: BookingId,
    ) -> booking_store::Result<RecordOutcome> {
        unimplemented!("never reached")
    }

    async fn create_booking(&self, _booking: NewBooking) -> booking_store::Result<Booking> {
        unimplemented!("never reached")
    }

    async fn save_booking(&self, _booking: &Booking) -> booking_store::Result<()> {
        unimplemented!("never reached")
    }

    async fn find_booking(&self, _id: BookingId) -> booking_store::Result<Option<Booking>> {
        Ok(None)
    }

    async fn delete_booking(&self, _id: BookingId) -> booking_store::Result<bool> {
        Ok(false)
    }

    async fn list_bookings(&self) -> booking_store::Result<Vec<Booking>> {
        Ok(Vec::new())
    }

    async fn list_bookings_for_user(&self, _user_id: &UserId) -> booking_store::Result<Vec<Booking>> {
        Ok(Vec::new())
    }

    async fn find_pending_older_than(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> booking_store::Result<Vec<Booking>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_dangling_record_is_inconsistent_state() {
    let seeded = seeded().await;
    let client = CountingClient::new(seeded.ledger.clone());
    let orchestrator = BookingOrchestrator::new(
        DanglingRecordStore,
        client.clone(),
        InProcessRecommender::new(seeded.ledger.clone()),
        RetryPolicy::default(),
    );

    let err = orchestrator
        .create_booking(CreateBooking::for_room(guest(), seeded.rooms[0], stay(5, 1), "Z"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SagaError::InconsistentState { booking_id, .. } if booking_id == BookingId::new(99)
    ));
    assert_eq!(client.confirms(), 0);
}

/// Never answers: every attempt runs into the call timeout.
struct SilentClient;

#[async_trait]
impl LedgerClient for SilentClient {
    async fn confirm(
        &self,
        _room_id: RoomId,
        _request: &AvailabilityRequest,
    ) -> Result<bool, RemoteError> {
        std::future::pending().await
    }

    async fn release(
        &self,
        _room_id: RoomId,
        _request: &AvailabilityRequest,
    ) -> Result<(), RemoteError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_saga_stays_pending_within_max_pending_duration() {
    let seeded = seeded().await;
    let policy = RetryPolicy::default();
    let orchestrator = BookingOrchestrator::new(
        seeded.store.clone(),
        SilentClient,
        InProcessRecommender::new(seeded.ledger.clone()),
        policy.clone(),
    );

    let started = tokio::time::Instant::now();
    let booking = orchestrator
        .create_booking(CreateBooking::for_room(guest(), seeded.rooms[0], stay(6, 2), "silent"))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(booking.status, BookingStatus::Cancelled);
    // The claim and its compensating release both spend their whole retry budget.
    assert!(elapsed > policy.worst_case_duration());
    assert!(elapsed <= max_pending_duration(&policy));
}

/// Delegates to an in-memory store, optionally serving a stale pending
/// list or reporting that another booking already holds the request id.
struct ScriptedStore {
    inner: InMemoryBookingStore,
    stale_pending: Option<Vec<Booking>>,
    record_winner: Option<BookingId>,
}

impl ScriptedStore {
    fn new(inner: InMemoryBookingStore) -> Self {
        Self {
            inner,
            stale_pending: None,
            record_winner: None,
        }
    }
}

#[async_trait]
impl BookingStore for ScriptedStore {
    async fn find_idempotency_record(
        &self,
        request_id: &RequestId,
    ) -> booking_store::Result<Option<IdempotencyRecord>> {
        self.inner.find_idempotency_record(request_id).await
    }

    async fn record_outcome(
        &self,
        request_id: &RequestId,
        booking_id: BookingId,
    ) -> booking_store::Result<RecordOutcome> {
        match self.record_winner {
            Some(winner) => Ok(RecordOutcome::AlreadyRecorded(IdempotencyRecord {
                request_id: request_id.clone(),
                booking_id: winner,
                processed_at: Utc::now(),
            })),
            None => self.inner.record_outcome(request_id, booking_id).await,
        }
    }

    async fn create_booking(&self, booking: NewBooking) -> booking_store::Result<Booking> {
        self.inner.create_booking(booking).await
    }

    async fn save_booking(&self, booking: &Booking) -> booking_store::Result<()> {
        self.inner.save_booking(booking).await
    }

    async fn find_booking(&self, id: BookingId) -> booking_store::Result<Option<Booking>> {
        self.inner.find_booking(id).await
    }

    async fn delete_booking(&self, id: BookingId) -> booking_store::Result<bool> {
        self.inner.delete_booking(id).await
    }

    async fn list_bookings(&self) -> booking_store::Result<Vec<Booking>> {
        self.inner.list_bookings().await
    }

    async fn list_bookings_for_user(&self, user_id: &UserId) -> booking_store::Result<Vec<Booking>> {
        self.inner.list_bookings_for_user(user_id).await
    }

    async fn find_pending_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> booking_store::Result<Vec<Booking>> {
        match &self.stale_pending {
            Some(pending) => Ok(pending.clone()),
            None => self.inner.find_pending_older_than(cutoff).await,
        }
    }
}

#[tokio::test]
async fn test_recovery_continues_past_a_failing_booking() {
    let seeded = seeded().await;
    let first = seeded
        .store
        .create_booking(
            NewBooking::new(guest(), seeded.rooms[0], stay(12, 1))
                .with_request_id(RequestId::new("R1")),
        )
        .await
        .unwrap();
    let second = seeded
        .store
        .create_booking(
            NewBooking::new(guest(), seeded.rooms[1], stay(12, 1))
                .with_request_id(RequestId::new("R2")),
        )
        .await
        .unwrap();

    // The first booking is settled elsewhere after the sweep listed it.
    let mut settled = first.clone();
    settled.cancel().unwrap();
    seeded.store.save_booking(&settled).await.unwrap();

    let mut store = ScriptedStore::new(seeded.store.clone());
    store.stale_pending = Some(vec![first, second.clone()]);
    let orchestrator = BookingOrchestrator::new(
        store,
        CountingClient::new(seeded.ledger.clone()),
        InProcessRecommender::new(seeded.ledger.clone()),
        RetryPolicy::default(),
    );

    let resolved = orchestrator.recover_pending(Duration::ZERO).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, second.id);
    assert_eq!(resolved[0].status, BookingStatus::Confirmed);
}

#[test]
fn test_losing_duplicate_is_counted_as_orphan() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(async {
                let seeded = seeded().await;
                let mut winner = seeded
                    .store
                    .create_booking(
                        NewBooking::new(UserId::new("guest-2"), seeded.rooms[1], stay(8, 1))
                            .with_request_id(RequestId::new("dup")),
                    )
                    .await
                    .unwrap();
                winner.cancel().unwrap();
                seeded.store.save_booking(&winner).await.unwrap();

                let mut store = ScriptedStore::new(seeded.store.clone());
                store.record_winner = Some(winner.id);
                let orchestrator = BookingOrchestrator::new(
                    store,
                    CountingClient::new(seeded.ledger.clone()),
                    InProcessRecommender::new(seeded.ledger.clone()),
                    RetryPolicy::default(),
                );

                let returned = orchestrator
                    .create_booking(CreateBooking::for_room(
                        guest(),
                        seeded.rooms[0],
                        stay(8, 1),
                        "dup",
                    ))
                    .await
                    .unwrap();
                assert_eq!(returned.id, winner.id);
                assert_eq!(returned.status, BookingStatus::Cancelled);

                // The losing booking was confirmed and still holds its nights.
                let claims = seeded.ledger.claimed_dates(seeded.rooms[0]).await.unwrap();
                assert_eq!(claims.len(), 2);
            });
    });

    let rendered = handle.render();
    assert!(rendered.contains(r#"booking_orphans_total{status="CONFIRMED"} 1"#));
}
