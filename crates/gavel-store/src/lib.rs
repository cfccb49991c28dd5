//! Alert store, user directory, and delivery ledger for the Gavel engine.
//!
//! The web layer owns alert and account CRUD; this crate exposes the narrow
//! contracts the notification engine needs ([`AlertStore`], [`UserDirectory`])
//! plus the engine-owned [`HitLedger`], whose SCHEDULED→SENT rows are the
//! single source of truth for "has this match been delivered".
//!
//! The in-memory implementations guard their state with `parking_lot` locks
//! and optionally snapshot it through [`gavel_persist::JsonStore`], so a CLI
//! process can stop and resume without losing pending hits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alerts;
pub mod error;
pub mod ledger;
pub mod users;

// Re-export main types at crate root
pub use alerts::{AlertStore, MemoryAlertStore};
pub use error::{Result, StoreError};
pub use ledger::{
    HitCursor, HitLedger, HitStatus, MemoryHitLedger, NewHit, ScheduledHit, ScheduledPage,
};
pub use users::{MemoryUserDirectory, UserAccount, UserDirectory};
