//! Match dispatch and batch scheduling for the Gavel alert engine.
//!
//! Two entry points drive everything:
//!
//! - [`RealTimeDispatcher::handle_document`] reacts to every newly-created
//!   document: it drains the percolator's match pages, records pending hits
//!   for batched alerts in the delivery ledger, and delivers real-time
//!   alerts immediately (one grouped email per user per pass, one webhook
//!   event per alert — with the cadence policy deciding which batched alerts
//!   still webhook right away).
//! - [`BatchScheduler::run`] is invoked by an external cron per cadence
//!   period: it selects pending ledger rows for one rate, groups them by
//!   user and alert, delivers, and flips the rows SENT so a re-run sends
//!   nothing. [`BatchScheduler::cleanup_old_hits`] bounds ledger growth.
//!
//! The [`Matcher`] trait is the seam to the search cluster's percolator;
//! [`WorkQueue`] carries work items from producers (ingestion, cron) to
//! worker processes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod error;
pub mod matcher;
pub mod queue;
pub mod realtime;

// Re-export main types at crate root
pub use batch::{BatchScheduler, BatchSummary};
pub use config::DispatchConfig;
pub use error::{DispatchError, Result};
pub use matcher::{MatchPage, Matcher, PageToken, Percolated, StaticMatcher};
pub use queue::{Task, WorkItem, WorkQueue};
pub use realtime::{RealTimeDispatcher, RealTimeSummary};
