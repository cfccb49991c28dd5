//! Error types for the gavel-alerts crate.

use thiserror::Error;

/// Errors that can occur in the alert domain layer.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid alert configuration.
    #[error("invalid alert: {reason}")]
    InvalidAlert {
        /// The reason the alert is invalid.
        reason: String,
    },

    /// A batch run was requested on a date the cadence does not allow.
    #[error("invalid run date: {reason}")]
    InvalidDate {
        /// The reason the date is refused.
        reason: String,
    },

    /// A batch run was requested for a rate that has no delivery window.
    #[error("invalid rate for batch delivery: {rate}")]
    InvalidRate {
        /// The offending rate, as its wire string.
        rate: String,
    },
}

/// Result type for alert domain operations.
pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_alert() {
        let err = AlertError::InvalidAlert {
            reason: "empty name".to_string(),
        };
        assert_eq!(err.to_string(), "invalid alert: empty name");
    }

    #[test]
    fn error_display_invalid_date() {
        let err = AlertError::InvalidDate {
            reason: "day 30 is not valid".to_string(),
        };
        assert_eq!(err.to_string(), "invalid run date: day 30 is not valid");
    }

    #[test]
    fn error_display_invalid_rate() {
        let err = AlertError::InvalidRate {
            rate: "off".to_string(),
        };
        assert_eq!(err.to_string(), "invalid rate for batch delivery: off");
    }
}
