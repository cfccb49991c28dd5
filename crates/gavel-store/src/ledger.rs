//! The delivery ledger: scheduled-hit rows awaiting batched delivery.
//!
//! The ledger is the one place where "has this been delivered" truth lives.
//! Rows are keyed (alert, document): scheduling the same pair twice while a
//! row is still pending is a silent no-op, and the SCHEDULED→SENT transition
//! is compare-and-swap so a row is sent at most once even under re-runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gavel_alerts::{AlertId, DocumentId, DocumentRecord, Highlights, Rate, UserId};
use gavel_persist::JsonStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Delivery state of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitStatus {
    /// Awaiting batched delivery.
    Scheduled,
    /// Included in a delivered email.
    Sent,
}

/// A persisted ledger row: one alert matched one document at one time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledHit {
    /// Ledger row id, unique and monotonic.
    pub row_id: u64,
    /// The alert that matched.
    pub alert_id: AlertId,
    /// The alert's owner, denormalized for per-user grouping.
    pub user_id: UserId,
    /// The alert's rate at scheduling time, denormalized for rate scans.
    pub rate: Rate,
    /// The matched document as it looked when it was ingested.
    pub document: DocumentRecord,
    /// Highlight fragments captured at match time.
    pub highlights: Highlights,
    /// Delivery state.
    pub status: HitStatus,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// A hit to be recorded in the ledger.
#[derive(Debug, Clone)]
pub struct NewHit {
    /// The alert that matched.
    pub alert_id: AlertId,
    /// The alert's owner.
    pub user_id: UserId,
    /// The alert's rate at match time.
    pub rate: Rate,
    /// The matched document.
    pub document: DocumentRecord,
    /// Highlight fragments from the matcher.
    pub highlights: Highlights,
    /// When the match was observed.
    pub created_at: DateTime<Utc>,
}

/// Resumption point for paginated ledger scans.
///
/// Pages are ordered by (created_at, row_id) — a stable key, so a scan never
/// skips or repeats rows even if the ledger is mutated mid-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitCursor {
    created_at: DateTime<Utc>,
    row_id: u64,
}

/// One page of a ledger scan.
#[derive(Debug, Clone)]
pub struct ScheduledPage {
    /// The rows in this page.
    pub hits: Vec<ScheduledHit>,
    /// Cursor for the next page, absent on the last page.
    pub next: Option<HitCursor>,
}

/// The delivery ledger contract.
pub trait HitLedger: Send + Sync {
    /// Records a hit. Returns `false` (not an error) when a SCHEDULED row for
    /// the same (alert, document) pair already exists.
    fn schedule(&self, hit: NewHit) -> Result<bool>;

    /// One page of SCHEDULED rows for alerts of the given rate, ordered by
    /// the stable (created_at, row_id) key.
    fn scheduled_by_rate(
        &self,
        rate: Rate,
        cursor: Option<HitCursor>,
        limit: usize,
    ) -> Result<ScheduledPage>;

    /// Transitions rows SCHEDULED→SENT. Rows already SENT (or missing) are
    /// skipped; returns how many rows actually transitioned.
    fn mark_sent(&self, row_ids: &[u64]) -> Result<usize>;

    /// Deletes SENT rows created before `sent_before` and SCHEDULED rows
    /// created before `scheduled_before`, regardless of rate. Returns the
    /// number of rows deleted.
    fn purge_older_than(
        &self,
        sent_before: DateTime<Utc>,
        scheduled_before: DateTime<Utc>,
    ) -> Result<usize>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerState {
    rows: BTreeMap<u64, ScheduledHit>,
    next_row_id: u64,
}

#[derive(Debug)]
struct Inner {
    state: LedgerState,
    /// (alert, document) pairs with a live SCHEDULED row.
    pending: BTreeSet<(AlertId, DocumentId)>,
}

impl Inner {
    fn from_state(state: LedgerState) -> Self {
        let pending = state
            .rows
            .values()
            .filter(|r| r.status == HitStatus::Scheduled)
            .map(|r| (r.alert_id, r.document.id))
            .collect();
        Self { state, pending }
    }
}

/// In-memory delivery ledger, optionally backed by JSON snapshots.
#[derive(Debug, Clone)]
pub struct MemoryHitLedger {
    inner: Arc<RwLock<Inner>>,
    store: Option<JsonStore>,
}

impl MemoryHitLedger {
    /// Creates an empty, ephemeral ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::from_state(LedgerState::default()))),
            store: None,
        }
    }

    /// Creates a ledger that loads from and snapshots to `state_dir`.
    #[must_use]
    pub fn with_snapshot(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "scheduled_hits");
        let state: LedgerState = store.load();
        debug!(count = state.rows.len(), "loaded scheduled hits from disk");
        Self {
            inner: Arc::new(RwLock::new(Inner::from_state(state))),
            store: Some(store),
        }
    }

    /// Total number of rows, any status. Intended for tests and diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().state.rows.len()
    }

    /// Whether the ledger holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().state.rows.is_empty()
    }

    fn snapshot(&self, inner: &Inner) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&inner.state) {
                warn!(error = %e, "failed to snapshot hit ledger");
            }
        }
    }
}

impl Default for MemoryHitLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl HitLedger for MemoryHitLedger {
    fn schedule(&self, hit: NewHit) -> Result<bool> {
        let mut inner = self.inner.write();
        let key = (hit.alert_id, hit.document.id);
        if inner.pending.contains(&key) {
            debug!(
                alert_id = %hit.alert_id,
                document_id = %hit.document.id,
                "hit already scheduled, skipping"
            );
            return Ok(false);
        }

        let row_id = inner.state.next_row_id;
        inner.state.next_row_id += 1;
        inner.state.rows.insert(
            row_id,
            ScheduledHit {
                row_id,
                alert_id: hit.alert_id,
                user_id: hit.user_id,
                rate: hit.rate,
                document: hit.document,
                highlights: hit.highlights,
                status: HitStatus::Scheduled,
                created_at: hit.created_at,
            },
        );
        inner.pending.insert(key);
        self.snapshot(&inner);
        Ok(true)
    }

    fn scheduled_by_rate(
        &self,
        rate: Rate,
        cursor: Option<HitCursor>,
        limit: usize,
    ) -> Result<ScheduledPage> {
        let inner = self.inner.read();
        let mut matching: Vec<&ScheduledHit> = inner
            .state
            .rows
            .values()
            .filter(|r| r.status == HitStatus::Scheduled && r.rate == rate)
            .filter(|r| match cursor {
                Some(c) => (r.created_at, r.row_id) > (c.created_at, c.row_id),
                None => true,
            })
            .collect();
        matching.sort_by_key(|r| (r.created_at, r.row_id));

        let has_more = matching.len() > limit;
        let hits: Vec<ScheduledHit> = matching.into_iter().take(limit).cloned().collect();
        let next = if has_more {
            hits.last().map(|r| HitCursor {
                created_at: r.created_at,
                row_id: r.row_id,
            })
        } else {
            None
        };
        Ok(ScheduledPage { hits, next })
    }

    fn mark_sent(&self, row_ids: &[u64]) -> Result<usize> {
        let mut inner = self.inner.write();
        let mut transitioned = 0;
        for row_id in row_ids {
            let Some(row) = inner.state.rows.get_mut(row_id) else {
                continue;
            };
            if row.status == HitStatus::Scheduled {
                row.status = HitStatus::Sent;
                let key = (row.alert_id, row.document.id);
                inner.pending.remove(&key);
                transitioned += 1;
            }
        }
        if transitioned > 0 {
            self.snapshot(&inner);
        }
        Ok(transitioned)
    }

    fn purge_older_than(
        &self,
        sent_before: DateTime<Utc>,
        scheduled_before: DateTime<Utc>,
    ) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.state.rows.len();
        let doomed: Vec<u64> = inner
            .state
            .rows
            .values()
            .filter(|r| match r.status {
                HitStatus::Sent => r.created_at < sent_before,
                HitStatus::Scheduled => r.created_at < scheduled_before,
            })
            .map(|r| r.row_id)
            .collect();
        for row_id in doomed {
            if let Some(row) = inner.state.rows.remove(&row_id) {
                inner.pending.remove(&(row.alert_id, row.document.id));
            }
        }
        let purged = before - inner.state.rows.len();
        if purged > 0 {
            self.snapshot(&inner);
        }
        Ok(purged)
    }
}
