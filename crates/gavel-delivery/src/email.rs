//! Alert email composition.
//!
//! One email per user per delivery pass. The subject enumerates the alert
//! names under a hard character budget; the HTML body keeps the matcher's
//! highlight markup while the plain-text body strips it; unsubscribe headers
//! reference the included alerts' secret keys.

use std::fmt::Write as _;

use gavel_alerts::{Alert, DocumentRecord, Highlights};
use once_cell::sync::Lazy;
use regex::Regex;

/// Subjects never exceed this many characters; longer ones are truncated and
/// end in `...`.
pub const SUBJECT_BUDGET: usize = 934;

/// Markup element wrapping matched terms in highlight fragments.
pub const HIGHLIGHT_TAG: &str = "strong";

static HIGHLIGHT_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new("</?strong>").expect("highlight markup pattern"));

/// One matched document plus its highlight fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentHit {
    /// The matched document.
    pub document: DocumentRecord,
    /// Highlight fragments from the matcher.
    pub highlights: Highlights,
}

impl DocumentHit {
    /// The case name, highlighted when the matcher flagged it.
    #[must_use]
    pub fn case_name_markup(&self) -> String {
        self.highlights
            .get("caseName")
            .and_then(<[String]>::first)
            .cloned()
            .unwrap_or_else(|| self.document.case_name.clone())
    }

    /// The excerpt, preferring highlighted fragments joined with ellipses.
    #[must_use]
    pub fn snippet_markup(&self) -> String {
        match self.highlights.get("text") {
            Some(fragments) if !fragments.is_empty() => fragments.join(" … "),
            _ => self.document.excerpt.clone(),
        }
    }
}

/// One alert's matches within a delivery pass, ordered for display.
#[derive(Debug, Clone)]
pub struct AlertHits {
    /// The alert that matched.
    pub alert: Alert,
    /// The documents shown in the email, already capped and ordered.
    pub documents: Vec<DocumentHit>,
    /// The full match count before the display cap was applied.
    pub total: usize,
}

impl AlertHits {
    /// True when the display cap hid part of the match set.
    #[must_use]
    pub fn is_capped(&self) -> bool {
        self.total > self.documents.len()
    }

    /// The hit count as shown: exact, or "N+" once the cap is reached.
    #[must_use]
    pub fn count_label(&self) -> String {
        if self.is_capped() {
            format!("{}+", self.documents.len())
        } else {
            format!("{}", self.total)
        }
    }
}

/// A fully composed outbound message, ready for an email sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line, within [`SUBJECT_BUDGET`].
    pub subject: String,
    /// Plain-text body, highlight markup stripped.
    pub text_body: String,
    /// HTML body, highlight markup preserved.
    pub html_body: String,
    /// Extra message headers (unsubscribe metadata).
    pub headers: Vec<(String, String)>,
}

impl OutboundEmail {
    /// Returns the first value for a header name, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Builds the subject line for a group of alerts with hits.
///
/// `"1 Alert has hits: name"` / `"3 Alerts have hits: a, b, c"`, truncated
/// with a trailing `...` when the concatenation would blow the budget.
#[must_use]
pub fn build_subject(hits: &[AlertHits]) -> String {
    let verb = if hits.len() == 1 { "has" } else { "have" };
    let noun = if hits.len() == 1 { "Alert" } else { "Alerts" };
    let names: Vec<&str> = hits.iter().map(|h| h.alert.name.as_str()).collect();
    let mut subject = format!("{} {noun} {verb} hits: {}", hits.len(), names.join(", "));
    if subject.len() > SUBJECT_BUDGET {
        truncate_to_boundary(&mut subject, SUBJECT_BUDGET - 3);
        subject.push_str("...");
    }
    subject
}

/// Strips highlight markup out of a fragment for plain-text rendering.
#[must_use]
pub fn strip_highlights(text: &str) -> String {
    HIGHLIGHT_MARKUP.replace_all(text, "").into_owned()
}

fn truncate_to_boundary(s: &mut String, max: usize) {
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Composes alert emails for one user and delivery pass.
#[derive(Debug, Clone)]
pub struct EmailComposer {
    /// Site base URL used in document links and unsubscribe targets.
    pub base_url: String,
}

impl EmailComposer {
    /// Creates a composer rooted at the given site URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Composes the single grouped email for a user's hits.
    ///
    /// `hits` must be non-empty; callers skip users with nothing to send.
    #[must_use]
    pub fn compose(&self, to: &str, hits: &[AlertHits]) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: build_subject(hits),
            text_body: self.text_body(hits),
            html_body: self.html_body(hits),
            headers: self.unsubscribe_headers(hits),
        }
    }

    /// Unsubscribe metadata for the included alerts.
    ///
    /// A single-alert email signals RFC 8058 one-click unsubscribe; a grouped
    /// email links a page that disables every included alert at once.
    fn unsubscribe_headers(&self, hits: &[AlertHits]) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let [only] = hits {
            headers.push((
                "List-Unsubscribe-Post".to_string(),
                "List-Unsubscribe=One-Click".to_string(),
            ));
            headers.push((
                "List-Unsubscribe".to_string(),
                format!(
                    "<{}/alert/unsubscribe/{}/>",
                    self.base_url, only.alert.secret_key
                ),
            ));
        } else {
            let keys: Vec<String> = hits
                .iter()
                .map(|h| format!("keys={}", h.alert.secret_key))
                .collect();
            headers.push((
                "List-Unsubscribe".to_string(),
                format!("<{}/alert/unsubscribe/list/?{}>", self.base_url, keys.join("&")),
            ));
        }
        headers
    }

    fn text_body(&self, hits: &[AlertHits]) -> String {
        let mut body = String::new();
        for hit in hits {
            let alert = &hit.alert;
            let _ = writeln!(
                body,
                "Your {} {} alert \"{}\" had {} hit{}:",
                rate_label(alert),
                type_label(alert),
                alert.name,
                hit.count_label(),
                plural(hit.total),
            );
            for doc in &hit.documents {
                let d = &doc.document;
                let _ = writeln!(
                    body,
                    "  - {} ({}{})",
                    strip_highlights(&doc.case_name_markup()),
                    d.court,
                    d.event_date
                        .map(|dt| format!(", {dt}"))
                        .unwrap_or_default(),
                );
                let snippet = strip_highlights(&doc.snippet_markup());
                if !snippet.is_empty() {
                    let _ = writeln!(body, "    {snippet}");
                }
                let _ = writeln!(body, "    {}{}", self.base_url, d.url);
            }
            body.push('\n');
        }
        body
    }

    fn html_body(&self, hits: &[AlertHits]) -> String {
        let mut body = String::from("<html><body>\n");
        for hit in hits {
            let alert = &hit.alert;
            let _ = writeln!(
                body,
                "<h2>Your {} {} alert \"{}\" had {} hit{}</h2>",
                rate_label(alert),
                type_label(alert),
                alert.name,
                hit.count_label(),
                plural(hit.total),
            );
            body.push_str("<ul>\n");
            for doc in &hit.documents {
                let d = &doc.document;
                let _ = writeln!(
                    body,
                    "<li><a href=\"{}{}\">{}</a> ({}{})<br/>{}</li>",
                    self.base_url,
                    d.url,
                    doc.case_name_markup(),
                    d.court,
                    d.event_date
                        .map(|dt| format!(", {dt}"))
                        .unwrap_or_default(),
                    doc.snippet_markup(),
                );
            }
            body.push_str("</ul>\n");
        }
        body.push_str("</body></html>\n");
        body
    }
}

fn rate_label(alert: &Alert) -> &'static str {
    match alert.rate {
        gavel_alerts::Rate::RealTime => "real-time",
        gavel_alerts::Rate::Daily => "daily",
        gavel_alerts::Rate::Weekly => "weekly",
        gavel_alerts::Rate::Monthly => "monthly",
        gavel_alerts::Rate::Off => "disabled",
    }
}

fn type_label(alert: &Alert) -> &'static str {
    match alert.alert_type {
        gavel_alerts::AlertType::Opinion => "opinion",
        gavel_alerts::AlertType::OralArgument => "oral argument",
        gavel_alerts::AlertType::Recap => "RECAP",
        gavel_alerts::AlertType::Docket => "docket",
    }
}

const fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
