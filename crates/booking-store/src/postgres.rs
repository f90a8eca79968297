use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, RequestId, RoomId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Booking, BookingStatus, BookingStore, BookingStoreError, IdempotencyRecord, NewBooking,
    RecordOutcome, Result,
};

const BOOKING_COLUMNS: &str =
    "id, user_id, room_id, start_date, end_date, status, request_id, created_at";

/// PostgreSQL-backed booking store.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Creates a new PostgreSQL booking store.
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

    fn row_to_booking(row: PgRow) -> Result<Booking> {
        let status: String = row.try_get("status")?;
        Ok(Booking {
            id: BookingId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            room_id: RoomId::new(row.try_get("room_id")?),
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            status: status.parse()?,
            request_id: row
                .try_get::<Option<String>, _>("request_id")?
                .map(RequestId::new),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_record(row: PgRow) -> Result<IdempotencyRecord> {
        Ok(IdempotencyRecord {
            request_id: RequestId::new(row.try_get::<String, _>("request_id")?),
            booking_id: BookingId::new(row.try_get("booking_id")?),
            processed_at: row.try_get("processed_at")?,
        })
    }

    async fn fetch_bookings(&self, sql: &str) -> Result<Vec<Booking>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_booking).collect()
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn find_idempotency_record(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query(
            "SELECT request_id, booking_id, processed_at FROM processed_requests WHERE request_id = $1",
        )
        .bind(request_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_record).transpose()
    }

    async fn record_outcome(
        &self,
        request_id: &RequestId,
        booking_id: BookingId,
    ) -> Result<RecordOutcome> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO processed_requests (request_id, booking_id)
            VALUES ($1, $2)
            ON CONFLICT (request_id) DO NOTHING
            RETURNING request_id, booking_id, processed_at
            "#,
        )
        .bind(request_id.as_str())
        .bind(booking_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            let missing_booking = matches!(
                &e,
                sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation()
            );
            if missing_booking {
                BookingStoreError::BookingNotFound(booking_id)
            } else {
                BookingStoreError::Database(e)
            }
        })?;

        if let Some(row) = inserted {
            return Ok(RecordOutcome::Recorded(Self::row_to_record(row)?));
        }

        // Lost the race: read back the winner.
        let existing = self
            .find_idempotency_record(request_id)
            .await?
            .ok_or(BookingStoreError::Database(sqlx::Error::RowNotFound))?;
        tracing::debug!(
            %request_id,
            winner = %existing.booking_id,
            loser = %booking_id,
            "request id already recorded"
        );
        Ok(RecordOutcome::AlreadyRecorded(existing))
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking> {
        let sql = format!(
            r#"
            INSERT INTO bookings (user_id, room_id, start_date, end_date, status, request_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {BOOKING_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(booking.user_id.as_str())
            .bind(booking.room_id.as_i64())
            .bind(booking.range.start_date)
            .bind(booking.range.end_date)
            .bind(BookingStatus::Pending.as_str())
            .bind(booking.request_id.as_ref().map(RequestId::as_str))
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_booking(row)
    }

    async fn save_booking(&self, booking: &Booking) -> Result<()> {
        // Only a PENDING row (or one already at the target status) can change.
        let updated = sqlx::query(
            r#"
            UPDATE bookings SET status = $2
            WHERE id = $1 AND (status = $2 OR status = $3)
            "#,
        )
        .bind(booking.id.as_i64())
        .bind(booking.status.as_str())
        .bind(BookingStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(());
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
                .bind(booking.id.as_i64())
                .fetch_optional(&self.pool)
                .await?;
        match current {
            None => Err(BookingStoreError::BookingNotFound(booking.id)),
            Some(status) => Err(BookingStoreError::IllegalTransition {
                from: status.parse()?,
                to: booking.status,
            }),
        }
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_booking).transpose()
    }

    async fn delete_booking(&self, id: BookingId) -> Result<bool> {
        // processed_requests rows go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        self.fetch_bookings(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY id DESC"
        ))
        .await
    }

    async fn list_bookings_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn find_pending_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM bookings
            WHERE status = $1 AND created_at < $2
            ORDER BY created_at ASC, id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(BookingStatus::Pending.as_str())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_booking).collect()
    }
}
