//! PostgreSQL integration tests
//!
//! These tests share a single PostgreSQL container and need Docker.
//! Run with:
//!
//! ```bash
//! cargo test -p booking-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use booking_store::{
    BookingStatus, BookingStore, BookingStoreError, NewBooking, PostgresBookingStore,
    RecordOutcome,
};
use chrono::{Days, Duration, Utc};
use common::{BookingId, DateRange, RequestId, RoomId, UserId};
use futures_util::future::join_all;
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_booking_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh store with its own pool and emptied tables
async fn get_test_store() -> PostgresBookingStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE processed_requests, bookings RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    PostgresBookingStore::new(pool)
}

fn new_booking(user: &str, request: &str) -> NewBooking {
    let start = Utc::now().date_naive() + Days::new(30);
    NewBooking::new(
        UserId::new(user),
        RoomId::new(1),
        DateRange::new(start, start + Days::new(2)),
    )
    .with_request_id(RequestId::new(request))
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_create_and_find_booking() {
    let store = get_test_store().await;

    let created = store.create_booking(new_booking("u1", "A")).await.unwrap();
    assert_eq!(created.status, BookingStatus::Pending);
    assert_eq!(created.request_id, Some(RequestId::new("A")));

    let found = store.find_booking(created.id).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.range(), created.range());
    assert!(store.find_booking(BookingId::new(999)).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_save_enforces_single_transition() {
    let store = get_test_store().await;
    let mut booking = store.create_booking(new_booking("u1", "A")).await.unwrap();

    booking.cancel().unwrap();
    store.save_booking(&booking).await.unwrap();
    store.save_booking(&booking).await.unwrap();

    booking.status = BookingStatus::Confirmed;
    let err = store.save_booking(&booking).await.unwrap_err();
    assert!(matches!(
        err,
        BookingStoreError::IllegalTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Confirmed
        }
    ));

    booking.id = BookingId::new(999);
    let err = store.save_booking(&booking).await.unwrap_err();
    assert!(matches!(err, BookingStoreError::BookingNotFound(_)));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_concurrent_records_resolve_to_one_winner() {
    let store = Arc::new(get_test_store().await);
    let key = RequestId::new("A");

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(store.create_booking(new_booking("u1", "A")).await.unwrap().id);
    }

    let outcomes = join_all(ids.iter().map(|id| {
        let store = Arc::clone(&store);
        let key = key.clone();
        let id = *id;
        async move { store.record_outcome(&key, id).await.unwrap() }
    }))
    .await;

    let recorded: Vec<_> = outcomes
        .iter()
        .filter(|o| matches!(o, RecordOutcome::Recorded(_)))
        .collect();
    assert_eq!(recorded.len(), 1);

    let winner = recorded[0].record().booking_id;
    assert!(outcomes.iter().all(|o| o.record().booking_id == winner));

    let stored = store.find_idempotency_record(&key).await.unwrap().unwrap();
    assert_eq!(stored.booking_id, winner);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_record_for_missing_booking_is_not_found() {
    let store = get_test_store().await;
    let err = store
        .record_outcome(&RequestId::new("A"), BookingId::new(42))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingStoreError::BookingNotFound(_)));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_delete_cascades_to_record() {
    let store = get_test_store().await;
    let booking = store.create_booking(new_booking("u1", "A")).await.unwrap();
    store
        .record_outcome(&RequestId::new("A"), booking.id)
        .await
        .unwrap();

    assert!(store.delete_booking(booking.id).await.unwrap());
    assert!(!store.delete_booking(booking.id).await.unwrap());
    assert!(
        store
            .find_idempotency_record(&RequestId::new("A"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_listings_and_pending_sweep() {
    let store = get_test_store().await;
    let a = store.create_booking(new_booking("u1", "A")).await.unwrap();
    let b = store.create_booking(new_booking("u2", "B")).await.unwrap();
    let mut c = store.create_booking(new_booking("u1", "C")).await.unwrap();
    c.confirm().unwrap();
    store.save_booking(&c).await.unwrap();

    let all: Vec<_> = store
        .list_bookings()
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(all, vec![c.id, b.id, a.id]);

    let mine: Vec<_> = store
        .list_bookings_for_user(&UserId::new("u1"))
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(mine, vec![c.id, a.id]);

    let pending: Vec<_> = store
        .find_pending_older_than(Utc::now() + Duration::seconds(5))
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(pending, vec![a.id, b.id]);
}
