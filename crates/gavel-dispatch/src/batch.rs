//! The batch scheduler.
//!
//! Externally triggered once per cadence period, it turns pending ledger
//! rows into grouped deliveries. Only SCHEDULED rows are selected, and they
//! flip to SENT right after the email handoff succeeds, so re-running a rate
//! for the same window sends nothing the second time. One user's failure
//! never aborts the run; their rows stay SCHEDULED for the next window.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use gavel_alerts::{
    Alert, AlertId, CadencePolicy, DateWindow, Rate, Tally, UserId, alerts_sent_key, window_for,
};
use gavel_delivery::{AlertHits, DeliveryEngine, DocumentHit, Recipient};
use gavel_store::{AlertStore, HitLedger, ScheduledHit, StoreError, UserDirectory};
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::error::Result;

/// What one batch run did.
#[derive(Debug, Clone, Copy)]
pub struct BatchSummary {
    /// The window the run covered.
    pub window: DateWindow,
    /// Users with pending hits.
    pub users: usize,
    /// Grouped emails handed to the transport.
    pub emails_sent: usize,
    /// Users whose email delivery failed; their rows stay SCHEDULED.
    pub emails_failed: usize,
    /// Webhook events attempted (success or failure).
    pub webhook_events: usize,
    /// Ledger rows transitioned SCHEDULED→SENT.
    pub hits_sent: usize,
}

/// Delivers pending scheduled hits for one rate at a time.
pub struct BatchScheduler {
    alerts: Arc<dyn AlertStore>,
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn HitLedger>,
    engine: DeliveryEngine,
    policy: CadencePolicy,
    config: DispatchConfig,
    tally: Tally,
}

impl BatchScheduler {
    /// Creates a scheduler over the given collaborators.
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn HitLedger>,
        engine: DeliveryEngine,
        policy: CadencePolicy,
        config: DispatchConfig,
        tally: Tally,
    ) -> Self {
        Self {
            alerts,
            users,
            ledger,
            engine,
            policy,
            config,
            tally,
        }
    }

    /// Runs batched delivery for one rate, anchored on `run_date`.
    ///
    /// Fails fast — before any I/O — when the rate has no delivery window on
    /// that date (monthly runs on the 29th-31st).
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Alert` for invalid rate/date combinations and
    /// `DispatchError::Store` for transient store failures. Per-user
    /// delivery failures are logged and isolated, never returned.
    pub fn run(&self, rate: Rate, run_date: NaiveDate) -> Result<BatchSummary> {
        let window = window_for(rate, run_date)?;
        info!(
            rate = %rate,
            start = %window.start,
            end = %window.end,
            "running scheduled alerts"
        );

        let by_user = self.collect_pending(rate)?;
        let mut summary = BatchSummary {
            window,
            users: by_user.len(),
            emails_sent: 0,
            emails_failed: 0,
            webhook_events: 0,
            hits_sent: 0,
        };

        for (user_id, user_rows) in by_user {
            self.deliver_user(rate, user_id, user_rows, window, &mut summary);
        }

        if summary.emails_sent > 0 {
            self.tally
                .incr(&alerts_sent_key(rate), summary.emails_sent as u64);
        }
        info!(
            rate = %rate,
            emails = summary.emails_sent,
            failed = summary.emails_failed,
            hits = summary.hits_sent,
            "finished scheduled alerts"
        );
        Ok(summary)
    }

    /// Purges ledger rows past their retention horizon, any status, any rate.
    ///
    /// Independent of delivery runs; invoked on its own schedule.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Store` when the ledger is unreachable.
    pub fn cleanup_old_hits(&self) -> Result<usize> {
        let now = Utc::now();
        let purged = self.ledger.purge_older_than(
            now - Duration::days(self.config.sent_retention_days),
            now - Duration::days(self.config.scheduled_retention_days),
        )?;
        info!(purged, "removed old scheduled alert hits");
        Ok(purged)
    }

    /// Drains every SCHEDULED row of the rate, paging on the stable ledger
    /// key, grouped by user.
    fn collect_pending(&self, rate: Rate) -> Result<BTreeMap<UserId, Vec<ScheduledHit>>> {
        let mut by_user: BTreeMap<UserId, Vec<ScheduledHit>> = BTreeMap::new();
        let mut cursor = None;
        loop {
            let page =
                self.ledger
                    .scheduled_by_rate(rate, cursor, self.config.ledger_page_size)?;
            for hit in page.hits {
                by_user.entry(hit.user_id).or_default().push(hit);
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(by_user)
    }

    fn deliver_user(
        &self,
        rate: Rate,
        user_id: UserId,
        user_rows: Vec<ScheduledHit>,
        window: DateWindow,
        summary: &mut BatchSummary,
    ) {
        // Group this user's rows by alert, keeping each alert's row ids so
        // the ledger transition covers exactly what was delivered.
        let mut by_alert: BTreeMap<AlertId, Vec<ScheduledHit>> = BTreeMap::new();
        for row in user_rows {
            by_alert.entry(row.alert_id).or_default().push(row);
        }

        let mut email_hits = Vec::new();
        let mut webhook_hits = Vec::new();
        let mut row_ids = Vec::new();
        let mut delivered_alerts: Vec<Alert> = Vec::new();

        for (alert_id, mut rows) in by_alert {
            let alert = match self.alerts.alert(alert_id) {
                Ok(alert) => alert,
                Err(StoreError::AlertNotFound { .. }) => {
                    debug!(alert_id = %alert_id, "pending hits for deleted alert; leaving to retention");
                    continue;
                }
                Err(e) => {
                    warn!(alert_id = %alert_id, error = %e, "alert lookup failed");
                    continue;
                }
            };
            if alert.rate == Rate::Off {
                debug!(alert_id = %alert_id, "alert turned off since scheduling; not delivering");
                continue;
            }

            // Most recent event first; ties broken by newest document.
            rows.sort_by(|a, b| {
                (b.document.event_date, b.document.id).cmp(&(a.document.event_date, a.document.id))
            });

            let total = rows.len();
            row_ids.extend(rows.iter().map(|r| r.row_id));

            let documents: Vec<DocumentHit> = rows
                .into_iter()
                .map(|r| DocumentHit {
                    document: r.document,
                    highlights: r.highlights,
                })
                .collect();

            if self.policy.fires_at_batch(alert.alert_type, rate) {
                webhook_hits.push(AlertHits {
                    alert: alert.clone(),
                    documents: documents
                        .iter()
                        .take(self.config.webhook_hit_cap)
                        .cloned()
                        .collect(),
                    total,
                });
            }
            email_hits.push(AlertHits {
                alert: alert.clone(),
                documents: documents
                    .into_iter()
                    .take(self.config.email_display_cap)
                    .collect(),
                total,
            });
            delivered_alerts.push(alert);
        }

        if email_hits.is_empty() {
            return;
        }

        let recipient = match self.recipient(user_id) {
            Ok(recipient) => recipient,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "skipping unresolvable user");
                summary.emails_failed += 1;
                return;
            }
        };

        match self.engine.deliver(&recipient, &email_hits, &webhook_hits) {
            Ok(outcome) => {
                summary.webhook_events += outcome.webhook_attempts.len();
                summary.emails_sent += 1;

                // The email is handed off; flip the rows and stamp the alerts
                // with the window end. A crash before this point re-sends on
                // the next run rather than losing hits.
                match self.ledger.mark_sent(&row_ids) {
                    Ok(transitioned) => summary.hits_sent += transitioned,
                    Err(e) => warn!(user_id = %user_id, error = %e, "failed to mark hits sent"),
                }
                let window_end = window
                    .end
                    .and_hms_opt(23, 59, 59)
                    .map(|dt| dt.and_utc())
                    .unwrap_or_else(Utc::now);
                for alert in &delivered_alerts {
                    if let Err(e) = self.alerts.update_last_hit(alert.id, window_end) {
                        warn!(alert_id = %alert.id, error = %e, "failed to update date_last_hit");
                    }
                }
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "batch delivery failed; hits stay scheduled");
                summary.emails_failed += 1;
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
}
