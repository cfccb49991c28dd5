//! Core types for the alert engine.
//!
//! This module provides the fundamental types used throughout the gavel
//! workspace:
//! - [`Rate`]: How often an alert's matches are delivered
//! - [`AlertType`]: The document category an alert watches
//! - [`Alert`]: A stored standing query with delivery preferences
//! - [`DocumentRecord`]: A newly-ingested document as seen by the engine
//! - [`Highlights`]: Matched-term markup passed through from the matcher
//! - [`MatchEvent`]: One alert matching one document

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};

/// How often an alert's matches are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rate {
    /// Deliver as soon as a match occurs.
    #[serde(rename = "rt")]
    RealTime,
    /// Deliver once per day, covering the previous day.
    #[serde(rename = "dly")]
    Daily,
    /// Deliver once per week, covering the previous seven days.
    #[serde(rename = "wly")]
    Weekly,
    /// Deliver once per month, covering the previous calendar month.
    #[serde(rename = "mly")]
    Monthly,
    /// The alert is disabled and never delivered.
    #[serde(rename = "off")]
    Off,
}

impl Rate {
    /// All rates, in delivery-frequency order.
    pub const ALL: [Self; 5] = [
        Self::RealTime,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Off,
    ];

    /// Returns the rate as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RealTime => "rt",
            Self::Daily => "dly",
            Self::Weekly => "wly",
            Self::Monthly => "mly",
            Self::Off => "off",
        }
    }

    /// Returns true for the rates delivered by the batch scheduler.
    #[must_use]
    pub const fn is_batched(&self) -> bool {
        matches!(self, Self::Daily | Self::Weekly | Self::Monthly)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Rate {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rt" => Ok(Self::RealTime),
            "dly" => Ok(Self::Daily),
            "wly" => Ok(Self::Weekly),
            "mly" => Ok(Self::Monthly),
            "off" => Ok(Self::Off),
            other => Err(AlertError::InvalidRate {
                rate: other.to_string(),
            }),
        }
    }
}

/// The document category an alert watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertType {
    /// Court opinions.
    #[serde(rename = "o")]
    Opinion,
    /// Oral argument audio.
    #[serde(rename = "oa")]
    OralArgument,
    /// RECAP filings.
    #[serde(rename = "r")]
    Recap,
    /// Whole dockets.
    #[serde(rename = "d")]
    Docket,
}

impl AlertType {
    /// Returns the type as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Opinion => "o",
            Self::OralArgument => "oa",
            Self::Recap => "r",
            Self::Docket => "d",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "o" => Ok(Self::Opinion),
            "oa" => Ok(Self::OralArgument),
            "r" => Ok(Self::Recap),
            "d" => Ok(Self::Docket),
            other => Err(AlertError::InvalidAlert {
                reason: format!("unknown alert type '{other}'"),
            }),
        }
    }
}

/// Identifier of a stored alert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an alert owner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an ingested document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Length of the unsubscribe token attached to every alert.
pub const SECRET_KEY_LENGTH: usize = 40;

/// Generates a random alphanumeric secret key for unsubscribe links.
#[must_use]
pub fn generate_secret_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// A saved standing query plus delivery preferences.
///
/// Alerts are created and edited elsewhere; the engine reads them, matches
/// documents against their queries, and touches only `date_last_hit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier.
    pub id: AlertId,
    /// The owning user.
    pub user_id: UserId,
    /// Human-readable name, shown in email subjects.
    pub name: String,
    /// The stored query string. Opaque to the engine; handed to the matcher.
    pub query: String,
    /// Delivery cadence.
    pub rate: Rate,
    /// Document category this alert watches.
    pub alert_type: AlertType,
    /// Token used in unsubscribe links, never shown elsewhere.
    pub secret_key: String,
    /// When this alert last delivered something.
    pub date_last_hit: Option<DateTime<Utc>>,
    /// When the alert was created.
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Maximum allowed length for alert names.
    pub const MAX_NAME_LENGTH: usize = 75;
    /// Maximum allowed length for alert queries.
    pub const MAX_QUERY_LENGTH: usize = 2500;

    /// Creates a new alert builder.
    pub fn builder(
        id: AlertId,
        user_id: UserId,
        name: impl Into<String>,
        query: impl Into<String>,
    ) -> AlertBuilder {
        AlertBuilder::new(id, user_id, name, query)
    }
}

/// Builder for creating [`Alert`] instances.
#[derive(Debug)]
pub struct AlertBuilder {
    id: AlertId,
    user_id: UserId,
    name: String,
    query: String,
    rate: Rate,
    alert_type: AlertType,
}

impl AlertBuilder {
    fn new(
        id: AlertId,
        user_id: UserId,
        name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user_id,
            name: name.into(),
            query: query.into(),
            rate: Rate::Daily,
            alert_type: AlertType::Opinion,
        }
    }

    /// Sets the delivery cadence.
    #[must_use]
    pub const fn rate(mut self, rate: Rate) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the document category.
    #[must_use]
    pub const fn alert_type(mut self, alert_type: AlertType) -> Self {
        self.alert_type = alert_type;
        self
    }

    /// Builds the [`Alert`], generating a fresh secret key.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAlert` if:
    /// - The name is empty or exceeds the maximum length
    /// - The query is empty or exceeds the maximum length
    pub fn build(self) -> Result<Alert> {
        if self.name.is_empty() {
            return Err(AlertError::InvalidAlert {
                reason: "alert name cannot be empty".to_string(),
            });
        }
        if self.name.len() > Alert::MAX_NAME_LENGTH {
            return Err(AlertError::InvalidAlert {
                reason: format!(
                    "alert name exceeds maximum length of {} characters",
                    Alert::MAX_NAME_LENGTH
                ),
            });
        }
        if self.query.is_empty() {
            return Err(AlertError::InvalidAlert {
                reason: "alert query cannot be empty".to_string(),
            });
        }
        if self.query.len() > Alert::MAX_QUERY_LENGTH {
            return Err(AlertError::InvalidAlert {
                reason: format!(
                    "alert query exceeds maximum length of {} characters",
                    Alert::MAX_QUERY_LENGTH
                ),
            });
        }

        Ok(Alert {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            query: self.query,
            rate: self.rate,
            alert_type: self.alert_type,
            secret_key: generate_secret_key(),
            date_last_hit: None,
            created_at: Utc::now(),
        })
    }
}

/// A newly-ingested document as seen by the alert engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique identifier in the search index.
    pub id: DocumentId,
    /// The document category, matched against [`Alert::alert_type`].
    pub category: AlertType,
    /// The case name.
    pub case_name: String,
    /// Absolute URL path to the document.
    pub url: String,
    /// A short text excerpt shown in alert emails.
    pub excerpt: String,
    /// The citation string of the issuing court.
    pub court: String,
    /// Date filed or date argued, used to order hits within an alert.
    pub event_date: Option<NaiveDate>,
}

/// Matched-term highlight fragments, keyed by document field.
///
/// Fragments arrive from the matcher already wrapped in markup; the delivery
/// layer keeps them in HTML bodies and strips them from plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlights {
    fields: std::collections::BTreeMap<String, Vec<String>>,
}

impl Highlights {
    /// Creates an empty highlight set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a highlighted fragment for a field.
    pub fn add(&mut self, field: impl Into<String>, fragment: impl Into<String>) {
        self.fields.entry(field.into()).or_default().push(fragment.into());
    }

    /// Returns the fragments for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Returns true if no fragments are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over (field, fragments) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// One alert matching one document, as produced by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// The alert whose query matched.
    pub alert_id: AlertId,
    /// The document that matched.
    pub document: DocumentRecord,
    /// Highlight fragments for the matched terms.
    pub highlights: Highlights,
    /// When the match was observed.
    pub matched_at: DateTime<Utc>,
}

/// The webhook payload shape a destination has opted into.
///
/// V1 is the legacy flat shape and carries a deprecation date in every event
/// envelope; V2 is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WebhookVersion {
    /// Legacy flat result records. Deprecated.
    #[serde(rename = "v1")]
    V1,
    /// Nested document records.
    #[serde(rename = "v2")]
    V2,
}

impl WebhookVersion {
    /// Returns the version as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl fmt::Display for WebhookVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's webhook destination for search-alert events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    /// Destination URL events are POSTed to.
    pub url: String,
    /// Payload shape the destination consumes.
    pub version: WebhookVersion,
    /// Disabled endpoints are skipped, not errored.
    pub enabled: bool,
}

impl WebhookEndpoint {
    /// Creates an enabled endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>, version: WebhookVersion) -> Self {
        Self {
            url: url.into(),
            version,
            enabled: true,
        }
    }

    /// Sets whether the endpoint is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_alert() -> Alert {
        Alert::builder(AlertId(1), UserId(7), "Fourth Amendment", "q=fourth+amendment")
            .rate(Rate::Daily)
            .alert_type(AlertType::Opinion)
            .build()
            .unwrap()
    }

    mod rate_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(Rate::RealTime, "rt")]
        #[test_case(Rate::Daily, "dly")]
        #[test_case(Rate::Weekly, "wly")]
        #[test_case(Rate::Monthly, "mly")]
        #[test_case(Rate::Off, "off")]
        fn rate_as_str(rate: Rate, expected: &str) {
            assert_eq!(rate.as_str(), expected);
            assert_eq!(format!("{rate}"), expected);
        }

        #[test]
        fn rate_is_batched() {
            assert!(!Rate::RealTime.is_batched());
            assert!(Rate::Daily.is_batched());
            assert!(Rate::Weekly.is_batched());
            assert!(Rate::Monthly.is_batched());
            assert!(!Rate::Off.is_batched());
        }

        #[test]
        fn rate_from_str_roundtrip() {
            for rate in Rate::ALL {
                let parsed: Rate = rate.as_str().parse().unwrap();
                assert_eq!(parsed, rate);
            }
        }

        #[test]
        fn rate_from_str_unknown_fails() {
            let result: Result<Rate> = "hourly".parse();
            assert!(matches!(result, Err(AlertError::InvalidRate { .. })));
        }

        #[test]
        fn rate_serialization_uses_wire_strings() {
            let json = serde_json::to_string(&Rate::Weekly).unwrap();
            assert_eq!(json, "\"wly\"");
            let parsed: Rate = serde_json::from_str("\"mly\"").unwrap();
            assert_eq!(parsed, Rate::Monthly);
        }
    }

    mod alert_type_tests {
        use super::*;

        #[test]
        fn alert_type_as_str() {
            assert_eq!(AlertType::Opinion.as_str(), "o");
            assert_eq!(AlertType::OralArgument.as_str(), "oa");
            assert_eq!(AlertType::Recap.as_str(), "r");
            assert_eq!(AlertType::Docket.as_str(), "d");
        }

        #[test]
        fn alert_type_from_str() {
            let parsed: AlertType = "oa".parse().unwrap();
            assert_eq!(parsed, AlertType::OralArgument);

            let result: Result<AlertType> = "x".parse();
            assert!(result.is_err());
        }
    }

    mod alert_tests {
        use super::*;

        #[test]
        fn build_alert() {
            let alert = test_alert();
            assert_eq!(alert.id, AlertId(1));
            assert_eq!(alert.user_id, UserId(7));
            assert_eq!(alert.name, "Fourth Amendment");
            assert_eq!(alert.rate, Rate::Daily);
            assert_eq!(alert.alert_type, AlertType::Opinion);
            assert!(alert.date_last_hit.is_none());
        }

        #[test]
        fn build_generates_secret_key() {
            let alert = test_alert();
            assert_eq!(alert.secret_key.len(), SECRET_KEY_LENGTH);
            assert!(alert.secret_key.chars().all(|c| c.is_ascii_alphanumeric()));
        }

        #[test]
        fn secret_keys_are_unique() {
            let a = generate_secret_key();
            let b = generate_secret_key();
            assert_ne!(a, b);
        }

        #[test]
        fn empty_name_fails() {
            let result = Alert::builder(AlertId(1), UserId(1), "", "q=test").build();
            assert!(matches!(result, Err(AlertError::InvalidAlert { .. })));
        }

        #[test]
        fn long_name_fails() {
            let name = "a".repeat(Alert::MAX_NAME_LENGTH + 1);
            let result = Alert::builder(AlertId(1), UserId(1), name, "q=test").build();
            assert!(matches!(result, Err(AlertError::InvalidAlert { .. })));
        }

        #[test]
        fn empty_query_fails() {
            let result = Alert::builder(AlertId(1), UserId(1), "name", "").build();
            assert!(matches!(result, Err(AlertError::InvalidAlert { .. })));
        }

        #[test]
        fn long_query_fails() {
            let query = "q".repeat(Alert::MAX_QUERY_LENGTH + 1);
            let result = Alert::builder(AlertId(1), UserId(1), "name", query).build();
            assert!(matches!(result, Err(AlertError::InvalidAlert { .. })));
        }

        #[test]
        fn alert_serialization_roundtrip() {
            let original = test_alert();
            let json = serde_json::to_string(&original).unwrap();
            let parsed: Alert = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, original);
        }
    }

    mod webhook_endpoint_tests {
        use super::*;

        #[test]
        fn new_endpoint_is_enabled() {
            let endpoint = WebhookEndpoint::new("https://example.com/hook", WebhookVersion::V2);
            assert!(endpoint.enabled);
            assert_eq!(endpoint.version, WebhookVersion::V2);
        }

        #[test]
        fn endpoint_can_be_disabled() {
            let endpoint =
                WebhookEndpoint::new("https://example.com/hook", WebhookVersion::V1).enabled(false);
            assert!(!endpoint.enabled);
        }

        #[test]
        fn version_wire_strings() {
            assert_eq!(WebhookVersion::V1.as_str(), "v1");
            assert_eq!(WebhookVersion::V2.as_str(), "v2");
            assert_eq!(serde_json::to_string(&WebhookVersion::V1).unwrap(), "\"v1\"");
        }
    }

    mod highlights_tests {
        use super::*;

        #[test]
        fn add_and_get() {
            let mut hl = Highlights::new();
            assert!(hl.is_empty());

            hl.add("caseName", "<strong>Roe</strong> v. Wade");
            hl.add("caseName", "<strong>Roe</strong>");
            hl.add("text", "the <strong>fourth</strong> amendment");

            assert_eq!(hl.get("caseName").map(<[String]>::len), Some(2));
            assert_eq!(hl.get("text").map(<[String]>::len), Some(1));
            assert!(hl.get("court").is_none());
            assert!(!hl.is_empty());
        }

        #[test]
        fn iterates_in_field_order() {
            let mut hl = Highlights::new();
            hl.add("text", "b");
            hl.add("caseName", "a");

            let fields: Vec<&str> = hl.iter().map(|(f, _)| f).collect();
            assert_eq!(fields, vec!["caseName", "text"]);
        }
    }
}
