//! Error types for the gavel-dispatch crate.

use thiserror::Error;

/// Errors that can occur while dispatching matches or running batches.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The percolator could not be reached. The whole entry point is safe to
    /// retry: ledger inserts are idempotent.
    #[error("matcher unavailable: {reason}")]
    Matcher {
        /// The transient failure description.
        reason: String,
    },

    /// Alert domain error (invalid rate or run date).
    #[error(transparent)]
    Alert(#[from] gavel_alerts::AlertError),

    /// Store layer error.
    #[error("store error: {0}")]
    Store(#[from] gavel_store::StoreError),

    /// Delivery engine error.
    #[error("delivery error: {0}")]
    Delivery(#[from] gavel_delivery::DeliveryError),
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_alerts::AlertError;

    #[test]
    fn error_display_matcher() {
        let err = DispatchError::Matcher {
            reason: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "matcher unavailable: connection reset");
    }

    #[test]
    fn invalid_date_passes_through_transparently() {
        let err: DispatchError = AlertError::InvalidDate {
            reason: "day 31".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "invalid run date: day 31");
        assert!(matches!(
            err,
            DispatchError::Alert(AlertError::InvalidDate { .. })
        ));
    }
}
