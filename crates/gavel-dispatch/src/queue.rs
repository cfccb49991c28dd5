//! The work queue feeding dispatcher and scheduler entry points.
//!
//! Producers (the ingestion pipeline, the cron layer) push work items;
//! worker processes claim and execute them. Cancelling an item only works
//! while it is unclaimed. The queue can snapshot to disk so items survive a
//! restart.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use gavel_alerts::{DocumentRecord, Rate};
use gavel_persist::JsonStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A unit of work for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Percolate one newly-created document.
    HandleDocument(DocumentRecord),
    /// Run batched delivery for a rate on a date.
    RunSchedule {
        /// The cadence to deliver.
        rate: Rate,
        /// The date the run is anchored on.
        run_date: NaiveDate,
    },
    /// Purge ledger rows past retention.
    Cleanup,
}

/// A queued task with its claim ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Claim/cancel ticket.
    pub id: u64,
    /// The work to do.
    pub task: Task,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueState {
    items: VecDeque<WorkItem>,
    next_id: u64,
}

/// FIFO work queue shared between producers and workers.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    state: Arc<Mutex<QueueState>>,
    store: Option<JsonStore>,
}

impl WorkQueue {
    /// Creates an empty, ephemeral queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            store: None,
        }
    }

    /// Creates a queue that loads from and snapshots to `state_dir`.
    #[must_use]
    pub fn with_snapshot(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "work_queue");
        let state: QueueState = store.load();
        debug!(count = state.items.len(), "loaded queued work from disk");
        Self {
            state: Arc::new(Mutex::new(state)),
            store: Some(store),
        }
    }

    /// Enqueues a task, returning its ticket.
    pub fn push(&self, task: Task) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.items.push_back(WorkItem { id, task });
        self.snapshot(&state);
        id
    }

    /// Claims the oldest item, removing it from the queue.
    #[must_use]
    pub fn claim(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();
        let item = state.items.pop_front();
        if item.is_some() {
            self.snapshot(&state);
        }
        item
    }

    /// Removes an unclaimed item. Returns `false` if it was already claimed
    /// or never existed.
    pub fn cancel(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        let before = state.items.len();
        state.items.retain(|item| item.id != id);
        let removed = state.items.len() < before;
        if removed {
            self.snapshot(&state);
        }
        removed
    }

    /// Number of unclaimed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    fn snapshot(&self, state: &QueueState) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(state) {
                warn!(error = %e, "failed to snapshot work queue");
            }
        }
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
