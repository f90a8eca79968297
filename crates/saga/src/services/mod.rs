//! Transports to the availability ledger and room catalog.

pub mod catalog;
pub mod ledger_client;

pub use catalog::{HttpRecommender, InProcessRecommender, RoomRecommender};
pub use ledger_client::{HttpLedgerClient, InProcessLedgerClient, LedgerClient, RemoteError};
