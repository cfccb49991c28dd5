//! The alert store contract and its in-memory implementation.
//!
//! Alerts are created and edited by the web layer; this engine only reads
//! them and advances `date_last_hit` after a successful delivery.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gavel_alerts::{Alert, AlertId, Rate};
use gavel_persist::JsonStore;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Read/write access to stored alerts.
pub trait AlertStore: Send + Sync {
    /// Fetches one alert.
    fn alert(&self, id: AlertId) -> Result<Alert>;

    /// All alerts at the given rate.
    fn alerts_by_rate(&self, rate: Rate) -> Result<Vec<Alert>>;

    /// Records that the alert delivered something at `at`.
    fn update_last_hit(&self, id: AlertId, at: DateTime<Utc>) -> Result<()>;
}

/// In-memory alert store, optionally backed by JSON snapshots.
#[derive(Debug, Clone)]
pub struct MemoryAlertStore {
    alerts: Arc<RwLock<BTreeMap<AlertId, Alert>>>,
    store: Option<JsonStore>,
}

impl MemoryAlertStore {
    /// Creates an empty, ephemeral store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alerts: Arc::new(RwLock::new(BTreeMap::new())),
            store: None,
        }
    }

    /// Creates a store that loads from and snapshots to `state_dir`.
    #[must_use]
    pub fn with_snapshot(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "alerts");
        let alerts: BTreeMap<AlertId, Alert> = store.load();
        debug!(count = alerts.len(), "loaded alerts from disk");
        Self {
            alerts: Arc::new(RwLock::new(alerts)),
            store: Some(store),
        }
    }

    /// Adds a new alert. Fails if the id is already taken.
    pub fn insert(&self, alert: Alert) -> Result<()> {
        let mut alerts = self.alerts.write();
        if alerts.contains_key(&alert.id) {
            return Err(StoreError::Duplicate {
                reason: format!("alert {} already exists", alert.id),
            });
        }
        alerts.insert(alert.id, alert);
        drop(alerts);
        self.snapshot();
        Ok(())
    }

    /// Number of stored alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }

    fn snapshot(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&*self.alerts.read()) {
                warn!(error = %e, "failed to snapshot alert store");
            }
        }
    }
}

impl Default for MemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore for MemoryAlertStore {
    fn alert(&self, id: AlertId) -> Result<Alert> {
        self.alerts
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::AlertNotFound { id })
    }

    fn alerts_by_rate(&self, rate: Rate) -> Result<Vec<Alert>> {
        Ok(self
            .alerts
            .read()
            .values()
            .filter(|a| a.rate == rate)
            .cloned()
            .collect())
    }

    fn update_last_hit(&self, id: AlertId, at: DateTime<Utc>) -> Result<()> {
        {
            let mut alerts = self.alerts.write();
            let alert = alerts
                .get_mut(&id)
                .ok_or(StoreError::AlertNotFound { id })?;
            alert.date_last_hit = Some(at);
        }
        self.snapshot();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_alerts::{AlertType, UserId};

    fn test_alert(id: u64, rate: Rate) -> Alert {
        Alert::builder(AlertId(id), UserId(1), format!("alert {id}"), "q=test")
            .rate(rate)
            .alert_type(AlertType::Opinion)
            .build()
            .unwrap()
    }

    #[test]
    fn insert_and_fetch() {
        let store = MemoryAlertStore::new();
        store.insert(test_alert(1, Rate::Daily)).unwrap();

        let alert = store.alert(AlertId(1)).unwrap();
        assert_eq!(alert.name, "alert 1");
    }

    #[test]
    fn insert_duplicate_fails() {
        let store = MemoryAlertStore::new();
        store.insert(test_alert(1, Rate::Daily)).unwrap();

        let result = store.insert(test_alert(1, Rate::Weekly));
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));
    }

    #[test]
    fn missing_alert_errors() {
        let store = MemoryAlertStore::new();
        let result = store.alert(AlertId(9));
        assert!(matches!(result, Err(StoreError::AlertNotFound { .. })));
    }

    #[test]
    fn filters_by_rate() {
        let store = MemoryAlertStore::new();
        store.insert(test_alert(1, Rate::Daily)).unwrap();
        store.insert(test_alert(2, Rate::Weekly)).unwrap();
        store.insert(test_alert(3, Rate::Daily)).unwrap();

        let daily = store.alerts_by_rate(Rate::Daily).unwrap();
        assert_eq!(daily.len(), 2);
        assert!(store.alerts_by_rate(Rate::Monthly).unwrap().is_empty());
    }

    #[test]
    fn update_last_hit() {
        let store = MemoryAlertStore::new();
        store.insert(test_alert(1, Rate::Daily)).unwrap();

        let at = Utc::now();
        store.update_last_hit(AlertId(1), at).unwrap();

        let alert = store.alert(AlertId(1)).unwrap();
        assert_eq!(alert.date_last_hit, Some(at));
    }

    #[test]
    fn update_last_hit_missing_alert_errors() {
        let store = MemoryAlertStore::new();
        let result = store.update_last_hit(AlertId(1), Utc::now());
        assert!(matches!(result, Err(StoreError::AlertNotFound { .. })));
    }

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().expect("tempdir");

        let store = MemoryAlertStore::with_snapshot(dir.path());
        store.insert(test_alert(1, Rate::Daily)).unwrap();
        store.update_last_hit(AlertId(1), Utc::now()).unwrap();

        let reloaded = MemoryAlertStore::with_snapshot(dir.path());
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.alert(AlertId(1)).unwrap().date_last_hit.is_some());
    }
}
