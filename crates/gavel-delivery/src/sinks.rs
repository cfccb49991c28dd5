//! Delivery sinks: the seams between the engine and real transports.
//!
//! The engine only ever talks to [`EmailSink`] and [`WebhookSink`]. Tests
//! substitute the in-memory implementations that record calls; production
//! wires [`HttpWebhookSink`] and whatever SMTP relay implements `EmailSink`
//! (the shipped [`LogEmailSink`] just logs the handoff).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::email::OutboundEmail;
use crate::error::{DeliveryError, Result};
use crate::webhook::WebhookEvent;

/// Outcome of one outbound push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The transport accepted the message.
    Delivered {
        /// HTTP-like status, when the transport reports one.
        status: Option<u16>,
    },
    /// The transport refused the message or never answered.
    Failed {
        /// HTTP-like status, when one came back.
        status: Option<u16>,
        /// What went wrong.
        reason: String,
    },
}

impl AttemptOutcome {
    /// Whether the attempt succeeded.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// A record of one outbound email or webhook push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// Where the message went (address or URL).
    pub target: String,
    /// How it went.
    pub outcome: AttemptOutcome,
    /// When the attempt finished.
    pub at: DateTime<Utc>,
}

impl DeliveryAttempt {
    /// Records a successful attempt.
    #[must_use]
    pub fn delivered(target: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            target: target.into(),
            outcome: AttemptOutcome::Delivered { status },
            at: Utc::now(),
        }
    }

    /// Records a failed attempt.
    #[must_use]
    pub fn failed(target: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            outcome: AttemptOutcome::Failed {
                status,
                reason: reason.into(),
            },
            at: Utc::now(),
        }
    }
}

/// Hands one composed email to the mail transport.
pub trait EmailSink: Send + Sync {
    /// Sends the message.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::EmailRejected` when the transport refuses it.
    fn send(&self, email: &OutboundEmail) -> Result<()>;
}

/// POSTs one webhook event to its destination.
///
/// Failures are part of the return value, never an error: a dead endpoint is
/// a recorded outcome, not a reason to stop a batch.
pub trait WebhookSink: Send + Sync {
    /// Posts the event and reports what happened.
    fn post(&self, event: &WebhookEvent) -> DeliveryAttempt;
}

/// An email sink that logs the handoff instead of speaking SMTP.
///
/// Deployments implement [`EmailSink`] against their relay; this keeps local
/// runs observable without one.
#[derive(Debug, Clone, Default)]
pub struct LogEmailSink;

impl EmailSink for LogEmailSink {
    fn send(&self, email: &OutboundEmail) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            headers = email.headers.len(),
            "would send alert email"
        );
        Ok(())
    }
}

/// Webhook sink speaking HTTP with a bounded per-call timeout.
///
/// Redirects are disabled; every POST carries the event's idempotency key so
/// receivers can de-duplicate external retries.
#[derive(Debug, Clone)]
pub struct HttpWebhookSink {
    client: reqwest::blocking::Client,
}

impl HttpWebhookSink {
    /// Default per-call timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    /// Creates a sink with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::SinkUnavailable` if the HTTP client cannot be
    /// constructed.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Creates a sink with a custom per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::SinkUnavailable` if the HTTP client cannot be
    /// constructed.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DeliveryError::SinkUnavailable {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl WebhookSink for HttpWebhookSink {
    fn post(&self, event: &WebhookEvent) -> DeliveryAttempt {
        let response = self
            .client
            .post(&event.url)
            .header("Content-Type", "application/json")
            .header("Idempotency-Key", event.event_id.to_string())
            .body(event.body.clone())
            .send();

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if resp.status().is_success() {
                    debug!(url = %event.url, status, "webhook delivered");
                    DeliveryAttempt::delivered(&event.url, Some(status))
                } else {
                    warn!(url = %event.url, status, "webhook endpoint rejected event");
                    DeliveryAttempt::failed(&event.url, Some(status), format!("HTTP {status}"))
                }
            }
            Err(e) => {
                warn!(url = %event.url, error = %e, "webhook delivery failed");
                DeliveryAttempt::failed(&event.url, None, e.to_string())
            }
        }
    }
}

/// Recording email sink for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmailSink {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    failing: Arc<Mutex<bool>>,
    failing_recipients: Arc<Mutex<Vec<String>>>,
}

impl MemoryEmailSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail (simulates a dead relay).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Makes sends to one address fail (simulates a bouncing mailbox).
    pub fn fail_for(&self, recipient: impl Into<String>) {
        self.failing_recipients.lock().push(recipient.into());
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().clone()
    }

    /// Number of messages sent so far.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl EmailSink for MemoryEmailSink {
    fn send(&self, email: &OutboundEmail) -> Result<()> {
        if *self.failing.lock() || self.failing_recipients.lock().contains(&email.to) {
            return Err(DeliveryError::EmailRejected {
                recipient: email.to.clone(),
                reason: "simulated transport failure".to_string(),
            });
        }
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

/// Recording webhook sink for tests.
#[derive(Debug, Clone)]
pub struct MemoryWebhookSink {
    posts: Arc<Mutex<Vec<WebhookEvent>>>,
    status: Arc<Mutex<u16>>,
}

impl MemoryWebhookSink {
    /// Creates a sink answering 200 to everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            posts: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(200)),
        }
    }

    /// Makes the sink answer with this status (e.g. 500) from now on.
    pub fn respond_with(&self, status: u16) {
        *self.status.lock() = status;
    }

    /// Events posted so far.
    #[must_use]
    pub fn posts(&self) -> Vec<WebhookEvent> {
        self.posts.lock().clone()
    }

    /// Number of events posted so far.
    #[must_use]
    pub fn post_count(&self) -> usize {
        self.posts.lock().len()
    }
}

impl Default for MemoryWebhookSink {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookSink for MemoryWebhookSink {
    fn post(&self, event: &WebhookEvent) -> DeliveryAttempt {
        self.posts.lock().push(event.clone());
        let status = *self.status.lock();
        if (200..300).contains(&status) {
            DeliveryAttempt::delivered(&event.url, Some(status))
        } else {
            DeliveryAttempt::failed(&event.url, Some(status), format!("HTTP {status}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_alerts::{Alert, AlertId, AlertType, Rate, UserId, WebhookEndpoint, WebhookVersion};

    fn test_email() -> OutboundEmail {
        OutboundEmail {
            to: "user@example.com".to_string(),
            subject: "1 Alert has hits: test".to_string(),
            text_body: "body".to_string(),
            html_body: "<p>body</p>".to_string(),
            headers: Vec::new(),
        }
    }

    fn test_event() -> WebhookEvent {
        let alert = Alert::builder(AlertId(1), UserId(1), "test", "q=test")
            .rate(Rate::Daily)
            .alert_type(AlertType::Opinion)
            .build()
            .unwrap();
        let endpoint = WebhookEndpoint::new("https://example.com/hook", WebhookVersion::V2);
        WebhookEvent::build(&endpoint, &alert, &[]).unwrap()
    }

    #[test]
    fn log_sink_accepts_everything() {
        let sink = LogEmailSink;
        assert!(sink.send(&test_email()).is_ok());
    }

    #[test]
    fn memory_email_sink_records() {
        let sink = MemoryEmailSink::new();
        sink.send(&test_email()).unwrap();

        assert_eq!(sink.sent_count(), 1);
        assert_eq!(sink.sent()[0].to, "user@example.com");
    }

    #[test]
    fn memory_email_sink_can_fail() {
        let sink = MemoryEmailSink::new();
        sink.set_failing(true);

        let result = sink.send(&test_email());
        assert!(matches!(result, Err(DeliveryError::EmailRejected { .. })));
        assert_eq!(sink.sent_count(), 0);

        sink.set_failing(false);
        assert!(sink.send(&test_email()).is_ok());
    }

    #[test]
    fn memory_email_sink_fails_per_recipient() {
        let sink = MemoryEmailSink::new();
        sink.fail_for("user@example.com");

        assert!(sink.send(&test_email()).is_err());

        let mut other = test_email();
        other.to = "other@example.com".to_string();
        assert!(sink.send(&other).is_ok());
        assert_eq!(sink.sent_count(), 1);
    }

    #[test]
    fn memory_webhook_sink_records_and_succeeds() {
        let sink = MemoryWebhookSink::new();
        let attempt = sink.post(&test_event());

        assert!(attempt.outcome.is_delivered());
        assert_eq!(sink.post_count(), 1);
    }

    #[test]
    fn memory_webhook_sink_simulates_failure() {
        let sink = MemoryWebhookSink::new();
        sink.respond_with(500);

        let attempt = sink.post(&test_event());
        assert!(!attempt.outcome.is_delivered());
        match attempt.outcome {
            AttemptOutcome::Failed { status, .. } => assert_eq!(status, Some(500)),
            AttemptOutcome::Delivered { .. } => panic!("expected failure"),
        }
        // The post is still recorded.
        assert_eq!(sink.post_count(), 1);
    }

    #[test]
    fn http_sink_reports_unreachable_endpoint_as_failure() {
        let sink = HttpWebhookSink::with_timeout(Duration::from_millis(200)).unwrap();
        let mut event = test_event();
        // Reserved TEST-NET-1 address: nothing listens there.
        event.url = "http://192.0.2.1:9/hook".to_string();

        let attempt = sink.post(&event);
        assert!(!attempt.outcome.is_delivered());
    }

    #[test]
    fn attempt_constructors() {
        let ok = DeliveryAttempt::delivered("https://example.com", Some(200));
        assert!(ok.outcome.is_delivered());

        let bad = DeliveryAttempt::failed("https://example.com", Some(503), "HTTP 503");
        assert!(!bad.outcome.is_delivered());
    }
}
