//! Saga orchestration for room bookings.
//!
//! A booking request is persisted as `PENDING`, the availability ledger is
//! asked to claim the stay's dates, and the booking is then moved to
//! `CONFIRMED` or, after a compensating release, `CANCELLED`:
//!
//! 1. Check the idempotency key and replay a recorded outcome
//! 2. Resolve the room (caller's choice or recommendation)
//! 3. Persist the pending booking
//! 4. Claim the dates through the confirmation client
//! 5. Confirm, or release and cancel
//! 6. Record the outcome against the idempotency key
//!
//! Calls to the ledger are bounded by a per-call timeout and retried with
//! exponential backoff on transient failures.

pub mod confirmation;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod services;
pub mod state;

pub use confirmation::{ClaimOutcome, ConfirmationClient};
pub use error::{Result, SagaError};
pub use orchestrator::{BookingOrchestrator, CreateBooking, max_pending_duration, validate_dates};
pub use retry::RetryPolicy;
pub use services::{
    HttpLedgerClient, HttpRecommender, InProcessLedgerClient, InProcessRecommender, LedgerClient,
    RemoteError, RoomRecommender,
};
pub use state::{BookingSaga, BookingSagaState};
