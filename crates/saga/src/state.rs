//! Booking saga state machine.

use booking_store::Booking;
use common::{BookingId, RequestId, RoomId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};

/// The state of a booking saga in its lifecycle.
///
/// State transitions:
/// ```text
/// New ──► IdempotencyChecked ──┬──► RoomSelected ──► Reserved ──┬──► Confirmed ──┬──► Recorded
///                              │                                └──► Cancelled ──┘
///                              └──► Recorded (replay)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BookingSagaState {
    /// Request accepted, nothing checked yet.
    #[default]
    New,

    /// No prior outcome exists for the request id.
    IdempotencyChecked,

    /// A room has been chosen.
    RoomSelected,

    /// A `PENDING` booking is persisted.
    Reserved,

    /// The ledger claim succeeded.
    Confirmed,

    /// The claim failed and was compensated.
    Cancelled,

    /// The outcome is stored against the request id (terminal state).
    Recorded,
}

impl BookingSagaState {
    /// Returns true if the saga may move from `self` to `next`.
    pub fn can_advance_to(&self, next: BookingSagaState) -> bool {
        use BookingSagaState::*;
        matches!(
            (self, next),
            (New, IdempotencyChecked)
                | (IdempotencyChecked, RoomSelected)
                | (IdempotencyChecked, Recorded)
                | (RoomSelected, Reserved)
                | (Reserved, Confirmed)
                | (Reserved, Cancelled)
                | (Confirmed, Recorded)
                | (Cancelled, Recorded)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingSagaState::Recorded)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingSagaState::New => "New",
            BookingSagaState::IdempotencyChecked => "IdempotencyChecked",
            BookingSagaState::RoomSelected => "RoomSelected",
            BookingSagaState::Reserved => "Reserved",
            BookingSagaState::Confirmed => "Confirmed",
            BookingSagaState::Cancelled => "Cancelled",
            BookingSagaState::Recorded => "Recorded",
        }
    }
}

impl std::fmt::Display for BookingSagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of one booking request through the saga.
#[derive(Debug, Clone)]
pub struct BookingSaga {
    request_id: RequestId,
    state: BookingSagaState,
    room_id: Option<RoomId>,
    booking_id: Option<BookingId>,
}

impl BookingSaga {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: BookingSagaState::New,
            room_id: None,
            booking_id: None,
        }
    }

    /// Picks up a persisted `PENDING` booking, e.g. during recovery.
    pub fn resume(request_id: RequestId, booking: &Booking) -> Self {
        Self {
            request_id,
            state: BookingSagaState::Reserved,
            room_id: Some(booking.room_id),
            booking_id: Some(booking.id),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn state(&self) -> BookingSagaState {
        self.state
    }

    pub fn room_id(&self) -> Option<RoomId> {
        self.room_id
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
    }

    /// Moves to `next`, failing with `InvalidState` on an illegal edge.
    pub fn advance(&mut self, next: BookingSagaState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(SagaError::InvalidState {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(
            request_id = %self.request_id,
            from = %self.state,
            to = %next,
            "booking saga advanced"
        );
        self.state = next;
        Ok(())
    }

    pub fn select_room(&mut self, room_id: RoomId) -> Result<()> {
        self.advance(BookingSagaState::RoomSelected)?;
        self.room_id = Some(room_id);
        Ok(())
    }

    pub fn reserve(&mut self, booking_id: BookingId) -> Result<()> {
        self.advance(BookingSagaState::Reserved)?;
        self.booking_id = Some(booking_id);
        Ok(())
    }
}
