use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookingId, DateRange, HotelId, RoomId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::store::{record_claim_outcome, record_release};
use crate::{
    AvailabilityLedger, DateClaim, Hotel, LedgerError, NewHotel, NewRoom, Result, Room,
    RoomCatalog,
};

const UNIQUE_ROOM_CLAIM_DATE: &str = "unique_room_claim_date";
const UNIQUE_HOTEL_ROOM_NUMBER: &str = "unique_hotel_room_number";
const FK_ROOMS_HOTEL: &str = "fk_rooms_hotel";

/// PostgreSQL-backed ledger and catalog.
///
/// Exclusivity rests on the `unique_room_claim_date` constraint: a claim
/// inserts one row per date in a single transaction, and any collision
/// rolls the whole batch back.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_room(row: PgRow) -> Result<Room> {
        Ok(Room {
            id: RoomId::new(row.try_get("id")?),
            hotel_id: HotelId::new(row.try_get("hotel_id")?),
            number: row.try_get("number")?,
            available: row.try_get("available")?,
            times_booked: row.try_get("times_booked")?,
        })
    }

    fn row_to_hotel(row: PgRow) -> Result<Hotel> {
        Ok(Hotel {
            id: HotelId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            address: row.try_get("address")?,
        })
    }
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

#[async_trait]
impl AvailabilityLedger for PostgresLedger {
    async fn claim(
        &self,
        room_id: RoomId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<bool> {
        if !range.is_ordered() {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        let available: Option<bool> =
            sqlx::query_scalar("SELECT available FROM rooms WHERE id = $1")
                .bind(room_id.as_i64())
                .fetch_optional(&mut *tx)
                .await?;
        if available != Some(true) {
            record_claim_outcome(room_id, range, false);
            return Ok(false);
        }

        // Ascending date order keeps overlapping batches from deadlocking.
        let dates: Vec<NaiveDate> = range.days().collect();
        let inserted = sqlx::query(
            r#"
            INSERT INTO room_date_claims (room_id, claim_date, booking_id)
            SELECT $1::BIGINT, d, $3::BIGINT FROM UNNEST($2::DATE[]) AS d
            "#,
        )
        .bind(room_id.as_i64())
        .bind(&dates)
        .bind(booking_id.map(|id| id.as_i64()))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if violated_constraint(&e) == Some(UNIQUE_ROOM_CLAIM_DATE) => {
                // Dropping the transaction rolls back every row of the batch.
                record_claim_outcome(room_id, range, false);
                return Ok(false);
            }
            Err(e) => return Err(LedgerError::Database(e)),
        }

        sqlx::query("UPDATE rooms SET times_booked = times_booked + 1 WHERE id = $1")
            .bind(room_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
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

        let result = sqlx::query(
            r#"
            DELETE FROM room_date_claims
            WHERE room_id = $1
              AND claim_date BETWEEN $2 AND $3
              AND ($4::BIGINT IS NULL OR booking_id = $4)
            "#,
        )
        .bind(room_id.as_i64())
        .bind(range.start_date)
        .bind(range.end_date)
        .bind(booking_id.map(|id| id.as_i64()))
        .execute(&self.pool)
        .await?;

        record_release(room_id, range, result.rows_affected());
        Ok(())
    }

    async fn claimed_dates(&self, room_id: RoomId) -> Result<Vec<DateClaim>> {
        let rows = sqlx::query(
            r#"
            SELECT claim_date, booking_id
            FROM room_date_claims
            WHERE room_id = $1
            ORDER BY claim_date ASC
            "#,
        )
        .bind(room_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DateClaim {
                    room_id,
                    date: row.try_get("claim_date")?,
                    booking_id: row
                        .try_get::<Option<i64>, _>("booking_id")?
                        .map(BookingId::new),
                })
            })
            .collect()
    }
}

#[async_trait]
impl RoomCatalog for PostgresLedger {
    async fn add_hotel(&self, hotel: NewHotel) -> Result<Hotel> {
        let row = sqlx::query(
            "INSERT INTO hotels (name, address) VALUES ($1, $2) RETURNING id, name, address",
        )
        .bind(&hotel.name)
        .bind(&hotel.address)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_hotel(row)
    }

    async fn list_hotels(&self) -> Result<Vec<Hotel>> {
        let rows = sqlx::query("SELECT id, name, address FROM hotels ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_hotel).collect()
    }

    async fn add_room(&self, room: NewRoom) -> Result<Room> {
        let row = sqlx::query(
            r#"
            INSERT INTO rooms (hotel_id, number, available, times_booked)
            VALUES ($1, $2, $3, $4)
            RETURNING id, hotel_id, number, available, times_booked
            "#,
        )
        .bind(room.hotel_id.as_i64())
        .bind(room.number)
        .bind(room.available)
        .bind(room.times_booked)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let constraint = violated_constraint(&e).map(str::to_owned);
            match constraint.as_deref() {
                Some(UNIQUE_HOTEL_ROOM_NUMBER) => LedgerError::RoomAlreadyExists {
                    hotel_id: room.hotel_id,
                    number: room.number,
                },
                Some(FK_ROOMS_HOTEL) => LedgerError::HotelNotFound(room.hotel_id),
                _ => LedgerError::Database(e),
            }
        })?;
        Self::row_to_room(row)
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>> {
        let row = sqlx::query(
            "SELECT id, hotel_id, number, available, times_booked FROM rooms WHERE id = $1",
        )
        .bind(room_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_room).transpose()
    }

    async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>> {
        let rows = sqlx::query(
            r#"
            SELECT id, hotel_id, number, available, times_booked
            FROM rooms
            WHERE ($1 = FALSE OR available = TRUE)
            ORDER BY id ASC
            "#,
        )
        .bind(available_only)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_room).collect()
    }

    async fn recommend(
        &self,
        hotel_id: Option<HotelId>,
        range: Option<DateRange>,
    ) -> Result<Vec<Room>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.hotel_id, r.number, r.available, r.times_booked
            FROM rooms r
            WHERE r.available = TRUE
              AND ($1::BIGINT IS NULL OR r.hotel_id = $1)
              AND ($2::DATE IS NULL OR NOT EXISTS (
                  SELECT 1 FROM room_date_claims c
                  WHERE c.room_id = r.id
                    AND c.claim_date BETWEEN $2 AND $3
              ))
            ORDER BY r.times_booked ASC, r.id ASC
            "#,
        )
        .bind(hotel_id.map(|id| id.as_i64()))
        .bind(range.map(|r| r.start_date))
        .bind(range.map(|r| r.end_date))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_room).collect()
    }
}
