//! Error types for the gavel-store crate.

use gavel_alerts::{AlertId, UserId};
use thiserror::Error;

/// Errors that can occur in the store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No alert with the given id.
    #[error("alert not found: {id}")]
    AlertNotFound {
        /// The missing alert id.
        id: AlertId,
    },

    /// No user with the given id.
    #[error("user not found: {id}")]
    UserNotFound {
        /// The missing user id.
        id: UserId,
    },

    /// A record with the same identity already exists.
    #[error("duplicate record: {reason}")]
    Duplicate {
        /// What collided.
        reason: String,
    },

    /// The backing store is temporarily unreachable. Callers are expected to
    /// retry the whole entry point; ledger idempotence makes that safe.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// The transient failure description.
        reason: String,
    },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_alert_not_found() {
        let err = StoreError::AlertNotFound { id: AlertId(12) };
        assert_eq!(err.to_string(), "alert not found: 12");
    }

    #[test]
    fn error_display_user_not_found() {
        let err = StoreError::UserNotFound { id: UserId(3) };
        assert_eq!(err.to_string(), "user not found: 3");
    }

    #[test]
    fn error_display_unavailable() {
        let err = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }
}
