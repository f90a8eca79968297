//! Booking records and their lifecycle.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, DateRange, RequestId, RoomId, UserId};
use serde::{Deserialize, Serialize};

use crate::{BookingStoreError, Result};

/// The status of a booking.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Persisted, waiting for the ledger claim to resolve.
    #[default]
    Pending,

    /// The ledger granted every date (terminal state).
    Confirmed,

    /// The claim was refused or failed and was compensated (terminal state).
    Cancelled,
}

impl BookingStatus {
    /// Returns true if the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Cancelled)
    }

    /// Returns the status as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(BookingStoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// A stored booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    /// Idempotency key of the request that created the booking.
    pub request_id: Option<RequestId>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Moves the booking to `next`, rejecting anything but a step out of
    /// `Pending`.
    pub fn transition_to(&mut self, next: BookingStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BookingStoreError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<()> {
        self.transition_to(BookingStatus::Confirmed)
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition_to(BookingStatus::Cancelled)
    }
}

/// Data for a booking that has not been persisted yet.
///
/// The store assigns the id and creation time; the status is always
/// `Pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub range: DateRange,
    pub request_id: Option<RequestId>,
}

impl NewBooking {
    pub fn new(user_id: UserId, room_id: RoomId, range: DateRange) -> Self {
        Self {
            user_id,
            room_id,
            range,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

/// Marks a request id as processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub request_id: RequestId,
    pub booking_id: BookingId,
    pub processed_at: DateTime<Utc>,
}

/// Result of [`BookingStore::record_outcome`](crate::BookingStore::record_outcome).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// This call created the record.
    Recorded(IdempotencyRecord),
    /// Another call had already recorded the request id; holds that record.
    AlreadyRecorded(IdempotencyRecord),
}

impl RecordOutcome {
    pub fn record(&self) -> &IdempotencyRecord {
        match self {
            RecordOutcome::Recorded(record) | RecordOutcome::AlreadyRecorded(record) => record,
        }
    }

    pub fn into_record(self) -> IdempotencyRecord {
        match self {
            RecordOutcome::Recorded(record) | RecordOutcome::AlreadyRecorded(record) => record,
        }
    }
}
