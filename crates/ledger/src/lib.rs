//! Room availability ledger.
//!
//! The ledger is the sole arbiter of date-range exclusivity for a room. A
//! room's availability for `[start, end]` is the absence of a [`DateClaim`]
//! for every date in that inclusive range; claims are created only as an
//! all-or-nothing batch and deleted only by a release.
//!
//! The same storage also backs the small room catalog used for
//! recommendations ([`RoomCatalog`]).

pub mod error;
pub mod memory;
pub mod postgres;
pub mod room;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use room::{AvailabilityRequest, DateClaim, Hotel, NewHotel, NewRoom, Room};
pub use store::{AvailabilityLedger, RoomCatalog};
