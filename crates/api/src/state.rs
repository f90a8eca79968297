//! Shared application state and its wiring from configuration.

use std::sync::Arc;

use booking_store::{BookingStore, BookingStoreError, InMemoryBookingStore, PostgresBookingStore};
use ledger::{
    AvailabilityLedger, InMemoryLedger, LedgerError, NewHotel, NewRoom, PostgresLedger,
    RoomCatalog,
};
use saga::{
    BookingOrchestrator, HttpLedgerClient, HttpRecommender, InProcessLedgerClient,
    InProcessRecommender, LedgerClient, RetryPolicy, RoomRecommender,
};
use thiserror::Error;

use crate::config::Config;

/// Orchestrator over type-erased stores and transports.
pub type Orchestrator =
    BookingOrchestrator<Arc<dyn BookingStore>, Arc<dyn LedgerClient>, Arc<dyn RoomRecommender>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub ledger: Arc<dyn AvailabilityLedger>,
    pub catalog: Arc<dyn RoomCatalog>,
}

/// Failures while assembling the state at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Booking store setup failed: {0}")]
    BookingStore(#[from] BookingStoreError),
}

impl AppState {
    /// Wires the orchestrator to the local ledger, or to a remote one when
    /// `ledger_url` is given.
    pub fn new(
        store: Arc<dyn BookingStore>,
        ledger: Arc<dyn AvailabilityLedger>,
        catalog: Arc<dyn RoomCatalog>,
        ledger_url: Option<&str>,
        policy: RetryPolicy,
    ) -> Self {
        let client: Arc<dyn LedgerClient>;
        let recommender: Arc<dyn RoomRecommender>;
        match ledger_url {
            Some(url) => {
                client = Arc::new(HttpLedgerClient::new(url));
                recommender = Arc::new(HttpRecommender::new(url));
            }
            None => {
                client = Arc::new(InProcessLedgerClient::new(ledger.clone()));
                recommender = Arc::new(InProcessRecommender::new(catalog.clone()));
            }
        }

        Self {
            orchestrator: BookingOrchestrator::new(store, client, recommender, policy),
            ledger,
            catalog,
        }
    }

    /// Everything in memory, with the ledger called in-process.
    pub fn in_memory(policy: RetryPolicy) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        Self::new(
            Arc::new(InMemoryBookingStore::new()),
            ledger.clone(),
            ledger,
            None,
            policy,
        )
    }
}

/// Builds the state described by `config`: PostgreSQL when a database URL
/// is set, in-memory otherwise. Demo data is loaded when configured.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>, StartupError> {
    let state = match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;
            let ledger = Arc::new(PostgresLedger::new(pool.clone()));
            ledger.run_migrations().await?;
            tracing::info!("connected to PostgreSQL, migrations applied");

            AppState::new(
                Arc::new(PostgresBookingStore::new(pool)),
                ledger.clone(),
                ledger,
                config.ledger_url.as_deref(),
                config.retry_policy(),
            )
        }
        None => {
            tracing::info!("no DATABASE_URL set, using in-memory stores");
            let ledger = Arc::new(InMemoryLedger::new());
            AppState::new(
                Arc::new(InMemoryBookingStore::new()),
                ledger.clone(),
                ledger,
                config.ledger_url.as_deref(),
                config.retry_policy(),
            )
        }
    };

    if let Some(url) = &config.ledger_url {
        tracing::info!(%url, "booking confirmations go to remote ledger");
    }
    if config.should_seed() {
        seed_demo_data(state.catalog.as_ref()).await?;
    }
    Ok(Arc::new(state))
}

/// Loads two hotels with five rooms each, unless the catalog already has
/// hotels.
///
/// Per hotel: 101 (booked 3 times), 102 (2), 103 (out of service, 1),
/// 201 and 202 (never booked).
pub async fn seed_demo_data(catalog: &dyn RoomCatalog) -> Result<(), LedgerError> {
    if !catalog.list_hotels().await?.is_empty() {
        tracing::debug!("catalog already populated, skipping demo data");
        return Ok(());
    }

    for (name, address) in [("Hotel 1", "Address 1"), ("Hotel 2", "Address 2")] {
        let hotel = catalog.add_hotel(NewHotel::new(name, address)).await?;
        for room in [
            NewRoom::new(hotel.id, 101).with_times_booked(3),
            NewRoom::new(hotel.id, 102).with_times_booked(2),
            NewRoom::new(hotel.id, 103).unavailable().with_times_booked(1),
            NewRoom::new(hotel.id, 201),
            NewRoom::new(hotel.id, 202),
        ] {
            let room = catalog.add_room(room).await?;
            tracing::debug!(room_id = %room.id, hotel_id = %hotel.id, "demo room added");
        }
    }
    tracing::info!("demo data loaded");
    Ok(())
}
