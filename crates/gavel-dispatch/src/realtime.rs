//! The real-time dispatcher.
//!
//! Runs once per newly-created document: drains the percolator's full match
//! page set, records pending hits for batched alerts, and delivers real-time
//! alerts immediately — one grouped email per user per pass, one webhook
//! event per alert. Whether a webhook fires now or with the batch email is
//! decided by the cadence policy, independently of the email cadence.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use gavel_alerts::{
    Alert, CadencePolicy, DocumentRecord, MatchEvent, Rate, Tally, UserId, alerts_sent_key,
};
use gavel_delivery::{AlertHits, DeliveryEngine, DocumentHit, Recipient};
use gavel_store::{AlertStore, HitLedger, NewHit, StoreError, UserDirectory};
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::error::Result;
use crate::matcher::Matcher;

/// What one dispatch pass did.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeSummary {
    /// Alerts the document matched.
    pub matches: usize,
    /// Hits recorded for later batch delivery.
    pub scheduled: usize,
    /// Grouped real-time emails handed to the transport.
    pub emails_sent: usize,
    /// Webhook events attempted (success or failure).
    pub webhook_events: usize,
}

/// Processes single-document match events as they occur.
pub struct RealTimeDispatcher {
    matcher: Arc<dyn Matcher>,
    alerts: Arc<dyn AlertStore>,
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn HitLedger>,
    engine: DeliveryEngine,
    policy: CadencePolicy,
    config: DispatchConfig,
    tally: Tally,
}

impl RealTimeDispatcher {
    /// Creates a dispatcher over the given collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        matcher: Arc<dyn Matcher>,
        alerts: Arc<dyn AlertStore>,
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn HitLedger>,
        engine: DeliveryEngine,
        policy: CadencePolicy,
        config: DispatchConfig,
        tally: Tally,
    ) -> Self {
        Self {
            matcher,
            alerts,
            users,
            ledger,
            engine,
            policy,
            config,
            tally,
        }
    }

    /// Handles one newly-created document.
    ///
    /// Invoked by the ingestion pipeline after every successful creation,
    /// never on updates. Safe to retry wholesale: ledger inserts are
    /// idempotent and real-time delivery is grouped per pass.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Matcher` or `DispatchError::Store` for
    /// transient collaborator failures. Per-user delivery failures are
    /// logged and isolated, never returned.
    pub fn handle_document(&self, document: &DocumentRecord) -> Result<RealTimeSummary> {
        let mut summary = RealTimeSummary::default();
        // One email per user per pass; webhooks keyed separately so the two
        // cadences stay independent.
        let mut email_groups: BTreeMap<UserId, Vec<AlertHits>> = BTreeMap::new();
        let mut webhook_groups: BTreeMap<UserId, Vec<AlertHits>> = BTreeMap::new();

        let mut page_token = None;
        loop {
            let page =
                self.matcher
                    .percolate(document, page_token, self.config.percolator_page_size)?;
            for matched in &page.hits {
                let alert = match self.alerts.alert(matched.alert_id) {
                    Ok(alert) => alert,
                    Err(StoreError::AlertNotFound { id }) => {
                        debug!(alert_id = %id, "matched alert no longer exists");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
                summary.matches += 1;

                let event = MatchEvent {
                    alert_id: alert.id,
                    document: document.clone(),
                    highlights: matched.highlights.clone(),
                    matched_at: Utc::now(),
                };
                let hit = AlertHits {
                    documents: vec![DocumentHit {
                        document: event.document.clone(),
                        highlights: event.highlights.clone(),
                    }],
                    total: 1,
                    alert: alert.clone(),
                };

                match alert.rate {
                    Rate::Off => {}
                    Rate::RealTime => {
                        email_groups.entry(alert.user_id).or_default().push(hit.clone());
                        webhook_groups.entry(alert.user_id).or_default().push(hit);
                    }
                    Rate::Daily | Rate::Weekly | Rate::Monthly => {
                        if self.ledger.schedule(NewHit {
                            alert_id: event.alert_id,
                            user_id: alert.user_id,
                            rate: alert.rate,
                            document: event.document,
                            highlights: event.highlights,
                            created_at: event.matched_at,
                        })? {
                            summary.scheduled += 1;
                        }
                        if self.policy.fires_at_match(alert.alert_type, alert.rate) {
                            webhook_groups.entry(alert.user_id).or_default().push(hit);
                        }
                    }
                }
            }
            match page.next {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        self.deliver_groups(&mut summary, email_groups, webhook_groups);

        if summary.emails_sent > 0 {
            self.tally
                .incr(&alerts_sent_key(Rate::RealTime), summary.emails_sent as u64);
        }
        info!(
            document_id = %document.id,
            matches = summary.matches,
            scheduled = summary.scheduled,
            emails = summary.emails_sent,
            webhooks = summary.webhook_events,
            "dispatched document"
        );
        Ok(summary)
    }

    fn deliver_groups(
        &self,
        summary: &mut RealTimeSummary,
        mut email_groups: BTreeMap<UserId, Vec<AlertHits>>,
        mut webhook_groups: BTreeMap<UserId, Vec<AlertHits>>,
    ) {
        let mut user_ids: Vec<UserId> = email_groups
            .keys()
            .chain(webhook_groups.keys())
            .copied()
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        for user_id in user_ids {
            let email_hits = email_groups.remove(&user_id).unwrap_or_default();
            let webhook_hits = webhook_groups.remove(&user_id).unwrap_or_default();

            let recipient = match self.recipient(user_id) {
                Ok(recipient) => recipient,
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "skipping unresolvable user");
                    continue;
                }
            };

            match self.engine.deliver(&recipient, &email_hits, &webhook_hits) {
                Ok(outcome) => {
                    summary.webhook_events += outcome.webhook_attempts.len();
                    if outcome.email.is_some() {
                        summary.emails_sent += 1;
                        let now = Utc::now();
                        for hit in &email_hits {
                            self.touch_last_hit(&hit.alert, now);
                        }
                    }
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "real-time delivery failed");
                }
            }
        }
    }

    fn recipient(&self, user_id: UserId) -> gavel_store::Result<Recipient> {
        Ok(Recipient {
            user_id,
            email: self.users.email(user_id)?,
            webhooks: self.users.webhooks(user_id)?,
        })
    }

    fn touch_last_hit(&self, alert: &Alert, at: chrono::DateTime<Utc>) {
        if let Err(e) = self.alerts.update_last_hit(alert.id, at) {
            warn!(alert_id = %alert.id, error = %e, "failed to update date_last_hit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::StaticMatcher;
    use gavel_alerts::{AlertId, AlertType, DocumentId, Highlights, WebhookEndpoint, WebhookVersion};
    use gavel_delivery::{EmailComposer, MemoryEmailSink, MemoryWebhookSink};
    use gavel_store::{MemoryAlertStore, MemoryHitLedger, MemoryUserDirectory, UserAccount};

    struct Harness {
        matcher: StaticMatcher,
        alerts: MemoryAlertStore,
        users: MemoryUserDirectory,
        ledger: MemoryHitLedger,
        email_sink: MemoryEmailSink,
        webhook_sink: MemoryWebhookSink,
        tally: Tally,
        dispatcher: RealTimeDispatcher,
    }

    fn harness() -> Harness {
        harness_with_config(DispatchConfig::default())
    }

    fn harness_with_config(config: DispatchConfig) -> Harness {
        let matcher = StaticMatcher::new();
        let alerts = MemoryAlertStore::new();
        let users = MemoryUserDirectory::new();
        let ledger = MemoryHitLedger::new();
        let email_sink = MemoryEmailSink::new();
        let webhook_sink = MemoryWebhookSink::new();
        let tally = Tally::new();
        let engine = DeliveryEngine::new(
            Arc::new(email_sink.clone()),
            Arc::new(webhook_sink.clone()),
            EmailComposer::new("https://www.gavel.dev"),
        );
        let dispatcher = RealTimeDispatcher::new(
            Arc::new(matcher.clone()),
            Arc::new(alerts.clone()),
            Arc::new(users.clone()),
            Arc::new(ledger.clone()),
            engine,
            CadencePolicy::shared_default().clone(),
            config,
            tally.clone(),
        );
        Harness {
            matcher,
            alerts,
            users,
            ledger,
            email_sink,
            webhook_sink,
            tally,
            dispatcher,
        }
    }

    fn add_user(h: &Harness, id: u64) {
        h.users.upsert(UserAccount {
            id: UserId(id),
            email: format!("user{id}@example.com"),
            webhooks: vec![WebhookEndpoint::new(
                format!("https://example.com/hook/{id}"),
                WebhookVersion::V2,
            )],
        });
    }

    fn add_alert(h: &Harness, id: u64, user: u64, name: &str, rate: Rate, alert_type: AlertType) {
        h.alerts
            .insert(
                Alert::builder(AlertId(id), UserId(user), name, "q=test")
                    .rate(rate)
                    .alert_type(alert_type)
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }

    fn test_document(id: u64, category: AlertType) -> DocumentRecord {
        DocumentRecord {
            id: DocumentId(id),
            category,
            case_name: "Roe v. Wade".to_string(),
            url: format!("/opinion/{id}/"),
            excerpt: "the question presented".to_string(),
            court: "SCOTUS".to_string(),
            event_date: None,
        }
    }

    #[test]
    fn real_time_alert_delivers_immediately_without_ledger_row() {
        let h = harness();
        add_user(&h, 1);
        add_alert(&h, 1, 1, "rt alert", Rate::RealTime, AlertType::Opinion);
        let doc = test_document(10, AlertType::Opinion);
        h.matcher.register(doc.id, AlertId(1), Highlights::new());

        let summary = h.dispatcher.handle_document(&doc).unwrap();

        assert_eq!(summary.emails_sent, 1);
        assert_eq!(summary.webhook_events, 1);
        assert_eq!(summary.scheduled, 0);
        assert!(h.ledger.is_empty());
        assert!(h.alerts.alert(AlertId(1)).unwrap().date_last_hit.is_some());
        assert_eq!(h.tally.get("alerts.sent.rt"), 1);
    }

    #[test]
    fn daily_alert_schedules_and_stays_silent() {
        let h = harness();
        add_user(&h, 1);
        add_alert(&h, 1, 1, "daily alert", Rate::Daily, AlertType::Opinion);
        let doc = test_document(10, AlertType::Opinion);
        h.matcher.register(doc.id, AlertId(1), Highlights::new());

        let summary = h.dispatcher.handle_document(&doc).unwrap();

        assert_eq!(summary.scheduled, 1);
        assert_eq!(summary.emails_sent, 0);
        assert_eq!(summary.webhook_events, 0);
        assert_eq!(h.email_sink.sent_count(), 0);
        assert_eq!(h.webhook_sink.post_count(), 0);
        assert_eq!(h.ledger.len(), 1);
        assert!(h.alerts.alert(AlertId(1)).unwrap().date_last_hit.is_none());
    }

    #[test]
    fn oral_argument_daily_alert_webhooks_now_emails_later() {
        let h = harness();
        add_user(&h, 1);
        add_alert(&h, 1, 1, "oa daily", Rate::Daily, AlertType::OralArgument);
        let doc = test_document(10, AlertType::OralArgument);
        h.matcher.register(doc.id, AlertId(1), Highlights::new());

        let summary = h.dispatcher.handle_document(&doc).unwrap();

        // Webhook fires at match time; the email waits for the daily batch.
        assert_eq!(summary.webhook_events, 1);
        assert_eq!(h.webhook_sink.post_count(), 1);
        assert_eq!(summary.emails_sent, 0);
        assert_eq!(h.email_sink.sent_count(), 0);
        assert_eq!(summary.scheduled, 1);
        assert_eq!(h.ledger.len(), 1);
    }

    #[test]
    fn off_alert_is_ignored() {
        let h = harness();
        add_user(&h, 1);
        add_alert(&h, 1, 1, "off alert", Rate::Off, AlertType::Opinion);
        let doc = test_document(10, AlertType::Opinion);
        h.matcher.register(doc.id, AlertId(1), Highlights::new());

        let summary = h.dispatcher.handle_document(&doc).unwrap();

        assert_eq!(summary.scheduled, 0);
        assert_eq!(summary.emails_sent, 0);
        assert_eq!(summary.webhook_events, 0);
        assert!(h.ledger.is_empty());
    }

    #[test]
    fn same_user_alerts_coalesce_into_one_email() {
        let h = harness();
        add_user(&h, 1);
        add_alert(&h, 1, 1, "first", Rate::RealTime, AlertType::Opinion);
        add_alert(&h, 2, 1, "second", Rate::RealTime, AlertType::Opinion);
        add_alert(&h, 3, 1, "third", Rate::RealTime, AlertType::Opinion);
        let doc = test_document(10, AlertType::Opinion);
        for id in 1..=3 {
            h.matcher.register(doc.id, AlertId(id), Highlights::new());
        }

        let summary = h.dispatcher.handle_document(&doc).unwrap();

        assert_eq!(summary.emails_sent, 1);
        assert_eq!(h.email_sink.sent_count(), 1);
        let subject = &h.email_sink.sent()[0].subject;
        assert!(subject.starts_with("3 Alerts have hits:"));
        assert!(subject.contains("first") && subject.contains("second") && subject.contains("third"));
        // Webhooks stay one event per alert.
        assert_eq!(h.webhook_sink.post_count(), 3);
    }

    #[test]
    fn different_users_get_separate_emails() {
        let h = harness();
        add_user(&h, 1);
        add_user(&h, 2);
        add_alert(&h, 1, 1, "mine", Rate::RealTime, AlertType::Opinion);
        add_alert(&h, 2, 2, "yours", Rate::RealTime, AlertType::Opinion);
        let doc = test_document(10, AlertType::Opinion);
        h.matcher.register(doc.id, AlertId(1), Highlights::new());
        h.matcher.register(doc.id, AlertId(2), Highlights::new());

        let summary = h.dispatcher.handle_document(&doc).unwrap();
        assert_eq!(summary.emails_sent, 2);
        assert_eq!(h.email_sink.sent_count(), 2);
    }

    #[test]
    fn fanout_pages_are_fully_drained() {
        let mut config = DispatchConfig::default();
        config.percolator_page_size = 10;
        let h = harness_with_config(config);
        add_user(&h, 1);
        let doc = test_document(10, AlertType::Opinion);
        for id in 1..=35 {
            add_alert(&h, id, 1, &format!("alert {id}"), Rate::Daily, AlertType::Opinion);
            h.matcher.register(doc.id, AlertId(id), Highlights::new());
        }

        let summary = h.dispatcher.handle_document(&doc).unwrap();
        assert_eq!(summary.matches, 35);
        assert_eq!(summary.scheduled, 35);
        assert_eq!(h.ledger.len(), 35);
    }

    #[test]
    fn reprocessing_a_document_does_not_duplicate_hits() {
        let h = harness();
        add_user(&h, 1);
        add_alert(&h, 1, 1, "daily", Rate::Daily, AlertType::Opinion);
        let doc = test_document(10, AlertType::Opinion);
        h.matcher.register(doc.id, AlertId(1), Highlights::new());

        h.dispatcher.handle_document(&doc).unwrap();
        let summary = h.dispatcher.handle_document(&doc).unwrap();

        assert_eq!(summary.scheduled, 0);
        assert_eq!(h.ledger.len(), 1);
    }

    #[test]
    fn matcher_outage_surfaces_to_caller() {
        let h = harness();
        h.matcher.set_unavailable(true);
        let doc = test_document(10, AlertType::Opinion);

        let result = h.dispatcher.handle_document(&doc);
        assert!(matches!(result, Err(crate::DispatchError::Matcher { .. })));
    }

    #[test]
    fn unresolvable_user_does_not_break_the_pass() {
        let h = harness();
        add_user(&h, 2);
        // Alert 1 belongs to user 1, who is missing from the directory.
        add_alert(&h, 1, 1, "orphan", Rate::RealTime, AlertType::Opinion);
        add_alert(&h, 2, 2, "healthy", Rate::RealTime, AlertType::Opinion);
        let doc = test_document(10, AlertType::Opinion);
        h.matcher.register(doc.id, AlertId(1), Highlights::new());
        h.matcher.register(doc.id, AlertId(2), Highlights::new());

        let summary = h.dispatcher.handle_document(&doc).unwrap();
        assert_eq!(summary.emails_sent, 1);
        assert_eq!(h.email_sink.sent()[0].to, "user2@example.com");
    }
}
