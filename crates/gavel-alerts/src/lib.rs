//! Domain core for the Gavel search-alert notification engine.
//!
//! `gavel-alerts` provides the types shared by every other crate in the
//! workspace: alerts and their delivery cadences, the documents that match
//! them, the delivery-window calculator for batched rates, the webhook
//! cadence policy table, and the counter registry used for observability.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use gavel_alerts::{Alert, AlertId, AlertType, Rate, UserId, window_for};
//!
//! let alert = Alert::builder(AlertId(1), UserId(42), "Fourth Amendment", "q=fourth+amendment")
//!     .rate(Rate::Daily)
//!     .alert_type(AlertType::Opinion)
//!     .build()
//!     .unwrap();
//! assert!(alert.rate.is_batched());
//!
//! // A daily run on March 1 covers the last day of February.
//! let run = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
//! let window = window_for(Rate::Daily, run).unwrap();
//! assert_eq!(window.start, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod policy;
pub mod stats;
pub mod types;
pub mod window;

// Re-export main types at crate root
pub use error::{AlertError, Result};
pub use policy::CadencePolicy;
pub use stats::{Tally, alerts_sent_key};
pub use types::{
    Alert, AlertBuilder, AlertId, AlertType, DocumentId, DocumentRecord, Highlights, MatchEvent,
    Rate, SECRET_KEY_LENGTH, UserId, WebhookEndpoint, WebhookVersion, generate_secret_key,
};
pub use window::{DateWindow, MONTHLY_LAST_VALID_DAY, window_for};
