//! Transport seam between the orchestrator and the availability ledger.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::RoomId;
use ledger::{AvailabilityLedger, AvailabilityRequest, LedgerError};
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

/// Failure of a single call to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No response arrived within the per-call timeout.
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    /// The ledger answered with a 5xx status.
    #[error("Ledger server error: HTTP {0}")]
    Server(u16),

    /// The ledger refused the request outright (4xx).
    #[error("Ledger rejected request: HTTP {0}")]
    Rejected(u16),

    /// The response body could not be decoded.
    #[error("Invalid ledger response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Returns true for failures a retry might fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Transport(_) | RemoteError::Timeout(_) | RemoteError::Server(_)
        )
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return status_error(status);
        }
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

impl From<LedgerError> for RemoteError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Database(_) | LedgerError::Migration(_) => {
                RemoteError::Transport(err.to_string())
            }
            LedgerError::RoomNotFound(_) | LedgerError::HotelNotFound(_) => {
                RemoteError::Rejected(StatusCode::NOT_FOUND.as_u16())
            }
            LedgerError::RoomAlreadyExists { .. } => {
                RemoteError::Rejected(StatusCode::CONFLICT.as_u16())
            }
        }
    }
}

fn status_error(status: StatusCode) -> RemoteError {
    if status.is_server_error() {
        RemoteError::Server(status.as_u16())
    } else {
        RemoteError::Rejected(status.as_u16())
    }
}

fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(status))
    }
}

/// Claim and release calls as seen from the booking side.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Asks the ledger to claim the request's dates for the room.
    async fn confirm(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<bool, RemoteError>;

    /// Asks the ledger to release the request's dates for the room.
    async fn release(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    async fn confirm(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<bool, RemoteError> {
        (**self).confirm(room_id, request).await
    }

    async fn release(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<(), RemoteError> {
        (**self).release(room_id, request).await
    }
}

/// Calls a ledger living in the same process.
#[derive(Clone)]
pub struct InProcessLedgerClient<L> {
    ledger: L,
}

impl<L: AvailabilityLedger> InProcessLedgerClient<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<L: AvailabilityLedger> LedgerClient for InProcessLedgerClient<L> {
    async fn confirm(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<bool, RemoteError> {
        Ok(self
            .ledger
            .claim(room_id, request.range(), request.booking_id)
            .await?)
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

/// Calls the ledger endpoints of a remote API server.
#[derive(Clone)]
pub struct HttpLedgerClient {
    client: Client,
    base_url: String,
}

impl HttpLedgerClient {
    /// Creates a client for the server at `base_url` (e.g. `http://ledger:3000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn room_url(&self, room_id: RoomId, action: &str) -> String {
        format!("{}/rooms/{}/{}", self.base_url, room_id, action)
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn confirm(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<bool, RemoteError> {
        let response = self
            .client
            .post(self.room_url(room_id, "confirm-availability"))
            .json(request)
            .send()
            .await?;
        Ok(check_status(response)?.json::<bool>().await?)
    }

    async fn release(
        &self,
        room_id: RoomId,
        request: &AvailabilityRequest,
    ) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.room_url(room_id, "release"))
            .json(request)
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }
}
