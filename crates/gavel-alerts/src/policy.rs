//! Webhook cadence policy.
//!
//! Emails and webhooks are two independent delivery decisions keyed off the
//! same match. Real-time alerts always webhook immediately, but some document
//! categories also webhook immediately while their *email* stays batched.
//! Which (alert type, rate) pairs get that treatment is an explicit policy
//! table rather than scattered conditionals.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;

use crate::types::{AlertType, Rate};

static DEFAULT_POLICY: Lazy<CadencePolicy> = Lazy::new(|| {
    let mut policy = CadencePolicy::new();
    // Oral-argument subscribers expect webhook pushes as soon as audio lands,
    // whatever their email cadence.
    policy.grant(AlertType::OralArgument, Rate::Daily);
    policy.grant(AlertType::OralArgument, Rate::Weekly);
    policy.grant(AlertType::OralArgument, Rate::Monthly);
    policy
});

/// Table of (alert type, rate) pairs whose webhooks fire at match time even
/// though their email delivery is batched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CadencePolicy {
    immediate: BTreeSet<(AlertType, Rate)>,
}

impl CadencePolicy {
    /// Creates an empty policy: only real-time alerts webhook immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared default policy table.
    #[must_use]
    pub fn shared_default() -> &'static Self {
        &DEFAULT_POLICY
    }

    /// Grants immediate webhooks to a (type, rate) pair.
    pub fn grant(&mut self, alert_type: AlertType, rate: Rate) {
        self.immediate.insert((alert_type, rate));
    }

    /// Revokes immediate webhooks from a (type, rate) pair.
    pub fn revoke(&mut self, alert_type: AlertType, rate: Rate) {
        self.immediate.remove(&(alert_type, rate));
    }

    /// Whether a webhook should fire at match time for this alert.
    ///
    /// Disabled alerts never fire; real-time alerts always do; batched rates
    /// fire only when the table grants it. The batch scheduler webhooks
    /// everything else alongside its emails.
    #[must_use]
    pub fn fires_at_match(&self, alert_type: AlertType, rate: Rate) -> bool {
        match rate {
            Rate::Off => false,
            Rate::RealTime => true,
            Rate::Daily | Rate::Weekly | Rate::Monthly => {
                self.immediate.contains(&(alert_type, rate))
            }
        }
    }

    /// Whether the batch scheduler still owes this alert a webhook, i.e. one
    /// did not already fire at match time.
    #[must_use]
    pub fn fires_at_batch(&self, alert_type: AlertType, rate: Rate) -> bool {
        rate.is_batched() && !self.fires_at_match(alert_type, rate)
    }
}
