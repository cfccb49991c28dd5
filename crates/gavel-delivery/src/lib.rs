//! Delivery engine for the Gavel alert workspace.
//!
//! `gavel-delivery` turns one user's grouped alert hits into exactly one
//! outbound email and zero or more webhook events:
//!
//! - **Email**: subject line enumerating the alert names under a hard
//!   character budget, HTML body with highlight markup, plain-text body with
//!   it stripped, and unsubscribe headers keyed by the alerts' secret keys.
//! - **Webhooks**: one event per (alert, endpoint) pair, shaped per the
//!   endpoint's payload version; V1 envelopes announce their deprecation
//!   date. Failures are recorded per event and never abort a pass.
//! - **Sinks**: [`EmailSink`] and [`WebhookSink`] are the transport seams;
//!   tests use the in-memory recording implementations instead of patching
//!   any global state.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gavel_alerts::{Alert, AlertId, AlertType, Rate, UserId};
//! use gavel_delivery::{
//!     AlertHits, DeliveryEngine, EmailComposer, MemoryEmailSink, MemoryWebhookSink, Recipient,
//! };
//!
//! let email_sink = MemoryEmailSink::new();
//! let engine = DeliveryEngine::new(
//!     Arc::new(email_sink.clone()),
//!     Arc::new(MemoryWebhookSink::new()),
//!     EmailComposer::new("https://www.gavel.dev"),
//! );
//!
//! let alert = Alert::builder(AlertId(1), UserId(9), "SCOTUS watch", "q=scotus")
//!     .rate(Rate::Daily)
//!     .build()
//!     .unwrap();
//! let hits = vec![AlertHits { alert, documents: Vec::new(), total: 0 }];
//! let recipient = Recipient {
//!     user_id: UserId(9),
//!     email: "user@example.com".to_string(),
//!     webhooks: Vec::new(),
//! };
//!
//! engine.deliver(&recipient, &hits, &[]).unwrap();
//! assert_eq!(email_sink.sent_count(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod email;
pub mod engine;
pub mod error;
pub mod sinks;
pub mod webhook;

// Re-export main types at crate root
pub use email::{
    AlertHits, DocumentHit, EmailComposer, OutboundEmail, SUBJECT_BUDGET, build_subject,
    strip_highlights,
};
pub use engine::{DeliveryEngine, DeliveryOutcome, Recipient};
pub use error::{DeliveryError, Result};
pub use sinks::{
    AttemptOutcome, DeliveryAttempt, EmailSink, HttpWebhookSink, LogEmailSink, MemoryEmailSink,
    MemoryWebhookSink, WebhookSink,
};
pub use webhook::{
    AlertSummary, EventEnvelope, EventMeta, EventPayload, EventResults, SEARCH_ALERT_EVENT,
    V1_DEPRECATION_DATE, V1Result, V2Result, WebhookEvent,
};
