//! The delivery engine: one user's grouped hits in, one email and zero or
//! more webhook events out.
//!
//! Email and webhooks are deliberately decoupled: a failing endpoint never
//! blocks the email, a bounced email never suppresses webhook events, and
//! the caller decides per pass which alerts get webhooks at all.

use std::sync::Arc;

use gavel_alerts::{UserId, WebhookEndpoint};
use tracing::{debug, info, warn};

use crate::email::{AlertHits, EmailComposer};
use crate::error::{DeliveryError, Result};
use crate::sinks::{DeliveryAttempt, EmailSink, WebhookSink};
use crate::webhook::WebhookEvent;

/// Where one user's deliveries go.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// The user the bundle belongs to.
    pub user_id: UserId,
    /// The user's email address.
    pub email: String,
    /// The user's enabled webhook endpoints.
    pub webhooks: Vec<WebhookEndpoint>,
}

/// What one delivery pass did for one user.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// The email attempt, when an email was owed.
    pub email: Option<DeliveryAttempt>,
    /// Every webhook attempt, success or failure.
    pub webhook_attempts: Vec<DeliveryAttempt>,
}

impl DeliveryOutcome {
    /// Number of webhook events that were accepted.
    #[must_use]
    pub fn webhooks_delivered(&self) -> usize {
        self.webhook_attempts
            .iter()
            .filter(|a| a.outcome.is_delivered())
            .count()
    }
}

/// Turns per-user alert bundles into outbound email and webhook events.
pub struct DeliveryEngine {
    email_sink: Arc<dyn EmailSink>,
    webhook_sink: Arc<dyn WebhookSink>,
    composer: EmailComposer,
}

impl DeliveryEngine {
    /// Creates an engine over the given sinks.
    pub fn new(
        email_sink: Arc<dyn EmailSink>,
        webhook_sink: Arc<dyn WebhookSink>,
        composer: EmailComposer,
    ) -> Self {
        Self {
            email_sink,
            webhook_sink,
            composer,
        }
    }

    /// Delivers one user's pass.
    ///
    /// `email_hits` becomes exactly one grouped email (skipped when empty);
    /// `webhook_hits` becomes one event per (alert, endpoint) pair, never
    /// merged across alerts. Webhook failures are recorded in the outcome;
    /// only an email failure is returned as an error, after all webhook
    /// events have been attempted.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::EmailRejected` when the email transport
    /// refuses the grouped message.
    pub fn deliver(
        &self,
        recipient: &Recipient,
        email_hits: &[AlertHits],
        webhook_hits: &[AlertHits],
    ) -> Result<DeliveryOutcome> {
        let webhook_attempts = self.send_webhooks(recipient, webhook_hits);

        let email = if email_hits.is_empty() {
            None
        } else {
            let message = self.composer.compose(&recipient.email, email_hits);
            match self.email_sink.send(&message) {
                Ok(()) => {
                    info!(
                        user_id = %recipient.user_id,
                        alerts = email_hits.len(),
                        subject = %message.subject,
                        "sent grouped alert email"
                    );
                    Some(DeliveryAttempt::delivered(&recipient.email, None))
                }
                Err(e) => {
                    warn!(user_id = %recipient.user_id, error = %e, "alert email failed");
                    return Err(e);
                }
            }
        };

        Ok(DeliveryOutcome {
            email,
            webhook_attempts,
        })
    }

    /// Sends one event per (alert, endpoint) pair, recording every outcome.
    fn send_webhooks(&self, recipient: &Recipient, hits: &[AlertHits]) -> Vec<DeliveryAttempt> {
        let mut attempts = Vec::new();
        for hit in hits {
            for endpoint in &recipient.webhooks {
                if !endpoint.enabled {
                    continue;
                }
                let event = match WebhookEvent::build(endpoint, &hit.alert, &hit.documents) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(
                            alert_id = %hit.alert.id,
                            url = %endpoint.url,
                            error = %e,
                            "failed to shape webhook event"
                        );
                        attempts.push(DeliveryAttempt::failed(&endpoint.url, None, e.to_string()));
                        continue;
                    }
                };
                debug!(
                    alert_id = %hit.alert.id,
                    url = %endpoint.url,
                    version = %endpoint.version,
                    results = hit.documents.len(),
                    "posting webhook event"
                );
                attempts.push(self.webhook_sink.post(&event));
            }
        }
        attempts
    }
}
