//! Error types for the gavel-delivery crate.

use thiserror::Error;

/// Errors that can occur while delivering alerts.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The email transport refused the message. Per-user: the caller logs it
    /// and moves on to the next user; ledger rows stay SCHEDULED.
    #[error("email rejected for {recipient}: {reason}")]
    EmailRejected {
        /// The address the message was sent to.
        recipient: String,
        /// Why the transport refused it.
        reason: String,
    },

    /// A sink could not be constructed.
    #[error("sink unavailable: {reason}")]
    SinkUnavailable {
        /// The construction failure.
        reason: String,
    },

    /// A payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DeliveryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_email_rejected() {
        let err = DeliveryError::EmailRejected {
            recipient: "user@example.com".to_string(),
            reason: "mailbox full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "email rejected for user@example.com: mailbox full"
        );
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: DeliveryError = json_err.into();
        assert!(matches!(err, DeliveryError::Serialization(_)));
    }
}
