//! Versioned webhook event payloads.
//!
//! One event per (alert, endpoint) pair per delivery pass; events are never
//! merged across alerts even when their emails are. The payload shape is a
//! tagged variant selected by the destination's configured version: V1 keeps
//! the legacy flat result records and carries a deprecation date in its
//! envelope, V2 nests full document records.

use chrono::{DateTime, Utc};
use gavel_alerts::{Alert, AlertId, WebhookEndpoint, WebhookVersion};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::email::{DocumentHit, strip_highlights};
use crate::error::Result;

/// Sunset date announced to V1 consumers in every event envelope.
pub const V1_DEPRECATION_DATE: &str = "2026-12-01";

/// The event type tag for search-alert events.
pub const SEARCH_ALERT_EVENT: &str = "search_alert";

/// The `webhook` half of an event: metadata about the delivery itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// What kind of event this is.
    pub event_type: String,
    /// The payload version the destination opted into.
    pub version: WebhookVersion,
    /// When the event was created.
    pub date_created: DateTime<Utc>,
    /// Upcoming sunset of this payload version, if any.
    pub deprecation_date: Option<String>,
}

/// A legacy flat result record (V1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V1Result {
    /// Document id.
    pub id: u64,
    /// Case name, markup stripped.
    pub case_name: String,
    /// URL path to the document.
    pub absolute_url: String,
    /// Text snippet, markup stripped.
    pub snippet: String,
    /// Issuing court.
    pub court: String,
}

/// A nested result record (V2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V2Result {
    /// The matched document in full.
    pub document: gavel_alerts::DocumentRecord,
    /// Highlight fragments keyed by field.
    pub highlights: gavel_alerts::Highlights,
}

/// Version-shaped result lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventResults {
    /// V1 flat records.
    V1(Vec<V1Result>),
    /// V2 nested records.
    V2(Vec<V2Result>),
}

impl EventResults {
    /// Number of result records.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::V1(r) => r.len(),
            Self::V2(r) => r.len(),
        }
    }

    /// Whether the event carries no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The alert fields echoed back in every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    /// The alert id.
    pub id: AlertId,
    /// The alert name.
    pub name: String,
    /// The stored query.
    pub query: String,
    /// The alert's email cadence.
    pub rate: gavel_alerts::Rate,
    /// The document category.
    pub alert_type: gavel_alerts::AlertType,
}

impl From<&Alert> for AlertSummary {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id,
            name: alert.name.clone(),
            query: alert.query.clone(),
            rate: alert.rate,
            alert_type: alert.alert_type,
        }
    }
}

/// The `payload` half of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// The alert that matched.
    pub alert: AlertSummary,
    /// The matched documents, shaped per version.
    pub results: EventResults,
}

/// A complete event envelope as POSTed to a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Delivery metadata.
    pub webhook: EventMeta,
    /// The alert and its results.
    pub payload: EventPayload,
}

/// A webhook event ready for a sink: destination plus serialized body.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Idempotency key, fresh per event.
    pub event_id: Uuid,
    /// Destination URL.
    pub url: String,
    /// Payload version of the destination.
    pub version: WebhookVersion,
    /// The serialized JSON body.
    pub body: String,
}

impl WebhookEvent {
    /// Shapes and serializes one event for an endpoint.
    ///
    /// `documents` is the ordered matched set, already capped by the caller
    /// at the webhook hit limit.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` if the payload cannot be
    /// serialized.
    pub fn build(
        endpoint: &WebhookEndpoint,
        alert: &Alert,
        documents: &[DocumentHit],
    ) -> Result<Self> {
        let results = match endpoint.version {
            WebhookVersion::V1 => EventResults::V1(documents.iter().map(shape_v1).collect()),
            WebhookVersion::V2 => EventResults::V2(documents.iter().map(shape_v2).collect()),
        };
        let envelope = EventEnvelope {
            webhook: EventMeta {
                event_type: SEARCH_ALERT_EVENT.to_string(),
                version: endpoint.version,
                date_created: Utc::now(),
                deprecation_date: match endpoint.version {
                    WebhookVersion::V1 => Some(V1_DEPRECATION_DATE.to_string()),
                    WebhookVersion::V2 => None,
                },
            },
            payload: EventPayload {
                alert: AlertSummary::from(alert),
                results,
            },
        };
        Ok(Self {
            event_id: Uuid::new_v4(),
            url: endpoint.url.clone(),
            version: endpoint.version,
            body: serde_json::to_string(&envelope)?,
        })
    }
}

fn shape_v1(hit: &DocumentHit) -> V1Result {
    V1Result {
        id: hit.document.id.0,
        case_name: strip_highlights(&hit.case_name_markup()),
        absolute_url: hit.document.url.clone(),
        snippet: strip_highlights(&hit.snippet_markup()),
        court: hit.document.court.clone(),
    }
}

fn shape_v2(hit: &DocumentHit) -> V2Result {
    V2Result {
        document: hit.document.clone(),
        highlights: hit.highlights.clone(),
    }
}
