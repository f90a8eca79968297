//! Claim and compensating release over a [`LedgerClient`].

use common::RoomId;
use ledger::AvailabilityRequest;

use crate::retry::RetryPolicy;
use crate::services::{LedgerClient, RemoteError};

/// How a claim attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The ledger granted every date.
    Confirmed,
    /// The ledger answered definitively that the dates cannot be claimed.
    Unavailable,
    /// No definitive answer: timeouts or errors outlasted the retries.
    Failed(String),
}

impl ClaimOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ClaimOutcome::Confirmed)
    }

    /// Short label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimOutcome::Confirmed => "confirmed",
            ClaimOutcome::Unavailable => "unavailable",
            ClaimOutcome::Failed(_) => "failed",
        }
    }
}

/// Wraps a ledger transport with the timeout and retry policy.
pub struct ConfirmationClient<C> {
    client: C,
    policy: RetryPolicy,
}

impl<C: LedgerClient> ConfirmationClient<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Claims the request's dates. A definitive `false` is never retried.
    #[tracing::instrument(skip(self, request), fields(booking_id = ?request.booking_id))]
    pub async fn claim(&self, room_id: RoomId, request: &AvailabilityRequest) -> ClaimOutcome {
        let result = self
            .policy
            .run("confirm", |_| self.client.confirm(room_id, request))
            .await;

        match result {
            Ok(true) => ClaimOutcome::Confirmed,
            Ok(false) => ClaimOutcome::Unavailable,
            Err(err) => ClaimOutcome::Failed(err.to_string()),
        }
    }

    /// Releases the request's dates; safe to retry because release is
    /// idempotent.
    #[tracing::instrument(skip(self, request), fields(booking_id = ?request.booking_id))]
    pub async fn release(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<(), RemoteError> {
        self.policy
            .run("release", |_| self.client.release(room_id, request))
            .await
    }
}
