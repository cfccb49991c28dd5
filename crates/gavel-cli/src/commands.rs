//! Command implementations: wiring and execution.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use gavel_alerts::{
    Alert, AlertId, CadencePolicy, DocumentRecord, Rate, Tally, UserId, WebhookEndpoint,
};
use gavel_delivery::{DeliveryEngine, EmailComposer, HttpWebhookSink, LogEmailSink};
use gavel_dispatch::{BatchScheduler, DispatchConfig, RealTimeDispatcher};
use gavel_store::{MemoryAlertStore, MemoryHitLedger, MemoryUserDirectory, UserAccount};

use crate::cli::{AddAlertArgs, AddUserArgs};
use crate::matcher::DevMatcher;

/// The wired engine: snapshot-backed stores plus both entry points.
pub struct App {
    /// Stored alerts.
    pub alerts: MemoryAlertStore,
    /// User delivery targets.
    pub users: MemoryUserDirectory,
    /// The delivery ledger.
    pub ledger: MemoryHitLedger,
    /// Delivery counters.
    pub tally: Tally,
    dispatcher: RealTimeDispatcher,
    scheduler: BatchScheduler,
}

/// Builds the engine over snapshot-backed stores in `state_dir`.
///
/// # Errors
///
/// Fails when the webhook HTTP client cannot be constructed.
pub fn build_app(state_dir: &Path, base_url: &str) -> anyhow::Result<App> {
    let alerts = MemoryAlertStore::with_snapshot(state_dir);
    let users = MemoryUserDirectory::with_snapshot(state_dir);
    let ledger = MemoryHitLedger::with_snapshot(state_dir);
    let tally = Tally::new();
    let config = DispatchConfig::default();
    let policy = CadencePolicy::shared_default().clone();

    let email_sink = Arc::new(LogEmailSink);
    let webhook_sink = Arc::new(HttpWebhookSink::new().context("building webhook client")?);

    let dispatcher = RealTimeDispatcher::new(
        Arc::new(DevMatcher::new(alerts.clone())),
        Arc::new(alerts.clone()),
        Arc::new(users.clone()),
        Arc::new(ledger.clone()),
        DeliveryEngine::new(
            email_sink.clone(),
            webhook_sink.clone(),
            EmailComposer::new(base_url),
        ),
        policy.clone(),
        config.clone(),
        tally.clone(),
    );
    let scheduler = BatchScheduler::new(
        Arc::new(alerts.clone()),
        Arc::new(users.clone()),
        Arc::new(ledger.clone()),
        DeliveryEngine::new(email_sink, webhook_sink, EmailComposer::new(base_url)),
        policy,
        config,
        tally.clone(),
    );

    Ok(App {
        alerts,
        users,
        ledger,
        tally,
        dispatcher,
        scheduler,
    })
}

/// Dispatches one document read from a JSON file.
pub fn handle_document(app: &App, file: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("reading document from {}", file.display()))?;
    let document: DocumentRecord = serde_json::from_str(&raw).context("parsing document JSON")?;

    let summary = app.dispatcher.handle_document(&document)?;
    println!(
        "document {}: {} matches, {} scheduled, {} emails, {} webhook events",
        document.id, summary.matches, summary.scheduled, summary.emails_sent, summary.webhook_events
    );
    Ok(())
}

/// Runs batched delivery for one rate.
pub fn send_scheduled(app: &App, rate: Rate, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let run_date = date.unwrap_or_else(|| Utc::now().date_naive());
    let summary = app.scheduler.run(rate, run_date)?;
    println!(
        "{rate} run over [{}, {}]: {} emails sent, {} failed, {} hits sent, {} webhook events",
        summary.window.start,
        summary.window.end,
        summary.emails_sent,
        summary.emails_failed,
        summary.hits_sent,
        summary.webhook_events
    );
    Ok(())
}

/// Purges old ledger rows.
pub fn cleanup(app: &App) -> anyhow::Result<()> {
    let purged = app.scheduler.cleanup_old_hits()?;
    println!("purged {purged} scheduled-hit rows");
    Ok(())
}

/// Registers an alert.
pub fn add_alert(app: &App, args: &AddAlertArgs) -> anyhow::Result<()> {
    let alert = Alert::builder(AlertId(args.id), UserId(args.user), &args.name, &args.query)
        .rate(args.rate.into())
        .alert_type(args.alert_type.into())
        .build()?;
    app.alerts.insert(alert)?;
    println!("added alert {}", args.id);
    Ok(())
}

/// Registers a user's delivery targets.
pub fn add_user(app: &App, args: &AddUserArgs) -> anyhow::Result<()> {
    let webhooks = args
        .webhook_url
        .as_ref()
        .map(|url| vec![WebhookEndpoint::new(url, args.webhook_version.into())])
        .unwrap_or_default();
    app.users.upsert(UserAccount {
        id: UserId(args.id),
        email: args.email.clone(),
        webhooks,
    });
    println!("added user {}", args.id);
    Ok(())
}
