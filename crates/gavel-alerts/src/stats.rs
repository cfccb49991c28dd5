//! Delivery counters.
//!
//! Each batch or real-time pass tallies `alerts.sent.<rate>` once per email
//! handed to the transport. Counters are process-local; exporters scrape the
//! snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::Rate;

/// The counter name for emails sent at a rate.
#[must_use]
pub fn alerts_sent_key(rate: Rate) -> String {
    format!("alerts.sent.{rate}")
}

/// A shared, thread-safe counter registry.
///
/// Cloning shares the underlying counters.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl Tally {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments a counter by `n`.
    pub fn incr(&self, key: &str, n: u64) {
        let mut counters = self.counters.lock();
        *counters.entry(key.to_string()).or_insert(0) += n;
    }

    /// Returns a counter's current value (zero if never incremented).
    #[must_use]
    pub fn get(&self, key: &str) -> u64 {
        self.counters.lock().get(key).copied().unwrap_or(0)
    }

    /// Returns a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters.lock().clone()
    }
}
