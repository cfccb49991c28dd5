//! The user directory contract.
//!
//! Accounts live in the web layer; the engine only needs a delivery address
//! and the user's webhook endpoints.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use gavel_alerts::{UserId, WebhookEndpoint};
use gavel_persist::JsonStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Delivery contact data for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// The user's id.
    pub id: UserId,
    /// Where alert emails go.
    pub email: String,
    /// The user's webhook destinations.
    pub webhooks: Vec<WebhookEndpoint>,
}

/// Lookup of user delivery targets.
pub trait UserDirectory: Send + Sync {
    /// The user's email address.
    fn email(&self, user: UserId) -> Result<String>;

    /// The user's enabled webhook endpoints.
    fn webhooks(&self, user: UserId) -> Result<Vec<WebhookEndpoint>>;
}

/// In-memory user directory, optionally backed by JSON snapshots.
#[derive(Debug, Clone)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<BTreeMap<UserId, UserAccount>>>,
    store: Option<JsonStore>,
}

impl MemoryUserDirectory {
    /// Creates an empty, ephemeral directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(BTreeMap::new())),
            store: None,
        }
    }

    /// Creates a directory that loads from and snapshots to `state_dir`.
    #[must_use]
    pub fn with_snapshot(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "users");
        let users: BTreeMap<UserId, UserAccount> = store.load();
        debug!(count = users.len(), "loaded users from disk");
        Self {
            users: Arc::new(RwLock::new(users)),
            store: Some(store),
        }
    }

    /// Adds or replaces a user account.
    pub fn upsert(&self, account: UserAccount) {
        self.users.write().insert(account.id, account);
        self.snapshot();
    }

    fn snapshot(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&*self.users.read()) {
                warn!(error = %e, "failed to snapshot user directory");
            }
        }
    }
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn email(&self, user: UserId) -> Result<String> {
        self.users
            .read()
            .get(&user)
            .map(|u| u.email.clone())
            .ok_or(StoreError::UserNotFound { id: user })
    }

    fn webhooks(&self, user: UserId) -> Result<Vec<WebhookEndpoint>> {
        let users = self.users.read();
        let account = users
            .get(&user)
            .ok_or(StoreError::UserNotFound { id: user })?;
        Ok(account
            .webhooks
            .iter()
            .filter(|w| w.enabled)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_alerts::WebhookVersion;

    fn test_account(id: u64) -> UserAccount {
        UserAccount {
            id: UserId(id),
            email: format!("user{id}@example.com"),
            webhooks: vec![
                WebhookEndpoint::new("https://example.com/a", WebhookVersion::V2),
                WebhookEndpoint::new("https://example.com/b", WebhookVersion::V1).enabled(false),
            ],
        }
    }

    #[test]
    fn email_lookup() {
        let dir = MemoryUserDirectory::new();
        dir.upsert(test_account(1));

        assert_eq!(dir.email(UserId(1)).unwrap(), "user1@example.com");
    }

    #[test]
    fn missing_user_errors() {
        let dir = MemoryUserDirectory::new();
        assert!(matches!(
            dir.email(UserId(1)),
            Err(StoreError::UserNotFound { .. })
        ));
    }

    #[test]
    fn webhooks_skip_disabled_endpoints() {
        let dir = MemoryUserDirectory::new();
        dir.upsert(test_account(1));

        let hooks = dir.webhooks(UserId(1)).unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].url, "https://example.com/a");
    }

    #[test]
    fn upsert_replaces() {
        let dir = MemoryUserDirectory::new();
        dir.upsert(test_account(1));

        let mut updated = test_account(1);
        updated.email = "new@example.com".to_string();
        dir.upsert(updated);

        assert_eq!(dir.email(UserId(1)).unwrap(), "new@example.com");
    }

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().expect("tempdir");

        let users = MemoryUserDirectory::with_snapshot(dir.path());
        users.upsert(test_account(4));

        let reloaded = MemoryUserDirectory::with_snapshot(dir.path());
        assert_eq!(reloaded.email(UserId(4)).unwrap(), "user4@example.com");
    }
}
