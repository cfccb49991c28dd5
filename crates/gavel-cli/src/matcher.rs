//! A query matcher for local runs.
//!
//! Production deployments implement [`Matcher`] against their search
//! cluster's percolator. This stand-in evaluates stored queries of the form
//! `q=term+term&type=o` with case-insensitive term matching over the
//! document's case name and excerpt, so the whole pipeline can be exercised
//! from the command line.

use gavel_alerts::{DocumentRecord, Highlights, Rate};
use gavel_dispatch::{MatchPage, Matcher, PageToken, Percolated, Result};
use gavel_store::{AlertStore, MemoryAlertStore};

/// Matches stored alert queries by term inclusion.
#[derive(Debug, Clone)]
pub struct DevMatcher {
    alerts: MemoryAlertStore,
}

impl DevMatcher {
    /// Creates a matcher over the alert store.
    #[must_use]
    pub fn new(alerts: MemoryAlertStore) -> Self {
        Self { alerts }
    }
}

impl Matcher for DevMatcher {
    fn percolate(
        &self,
        document: &DocumentRecord,
        page: Option<PageToken>,
        page_size: usize,
    ) -> Result<MatchPage> {
        let mut matched = Vec::new();
        for rate in [Rate::RealTime, Rate::Daily, Rate::Weekly, Rate::Monthly] {
            for alert in self.alerts.alerts_by_rate(rate)? {
                if alert.alert_type != document.category {
                    continue;
                }
                let terms = query_terms(&alert.query);
                if terms.is_empty() {
                    continue;
                }
                let haystack =
                    format!("{} {}", document.case_name, document.excerpt).to_lowercase();
                if terms.iter().all(|t| haystack.contains(t.as_str())) {
                    matched.push(Percolated {
                        alert_id: alert.id,
                        highlights: build_highlights(document, &terms),
                    });
                }
            }
        }
        matched.sort_by_key(|p| p.alert_id);

        let offset = page.map_or(0, |t| t.0);
        let hits: Vec<Percolated> = matched.iter().skip(offset).take(page_size).cloned().collect();
        let consumed = offset + hits.len();
        let next = (consumed < matched.len()).then_some(PageToken(consumed));
        Ok(MatchPage { hits, next })
    }
}

/// Extracts lowercase search terms from a stored query string.
fn query_terms(query: &str) -> Vec<String> {
    query
        .split('&')
        .find_map(|param| param.strip_prefix("q="))
        .map(|q| {
            q.split(['+', ' '])
                .filter(|t| !t.is_empty())
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default()
}

fn build_highlights(document: &DocumentRecord, terms: &[String]) -> Highlights {
    let mut highlights = Highlights::new();
    if let Some(marked) = wrap_terms(&document.case_name, terms) {
        highlights.add("caseName", marked);
    }
    if let Some(marked) = wrap_terms(&document.excerpt, terms) {
        highlights.add("text", marked);
    }
    highlights
}

/// Wraps each term occurrence in highlight markup, or `None` when nothing
/// matched. Skips text where lowercasing shifts byte offsets.
fn wrap_terms(text: &str, terms: &[String]) -> Option<String> {
    let lower = text.to_lowercase();
    if lower.len() != text.len() {
        return None;
    }

    let mut spans: Vec<(usize, usize)> = Vec::new();
    for term in terms {
        let mut from = 0;
        while let Some(pos) = lower[from..].find(term.as_str()) {
            let start = from + pos;
            spans.push((start, start + term.len()));
            from = start + term.len();
        }
    }
    if spans.is_empty() {
        return None;
    }
    spans.sort_unstable();

    let mut out = String::with_capacity(text.len() + spans.len() * 17);
    let mut cursor = 0;
    for (start, end) in spans {
        if start < cursor {
            continue;
        }
        out.push_str(&text[cursor..start]);
        out.push_str("<strong>");
        out.push_str(&text[start..end]);
        out.push_str("</strong>");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_alerts::{Alert, AlertId, AlertType, DocumentId, UserId};

    fn store_with(alerts: &[(u64, &str, Rate, AlertType)]) -> MemoryAlertStore {
        let store = MemoryAlertStore::new();
        for (id, query, rate, alert_type) in alerts {
            store
                .insert(
                    Alert::builder(AlertId(*id), UserId(1), format!("alert {id}"), *query)
                        .rate(*rate)
                        .alert_type(*alert_type)
                        .build()
                        .unwrap(),
                )
                .unwrap();
        }
        store
    }

    fn opinion(case_name: &str, excerpt: &str) -> DocumentRecord {
        DocumentRecord {
            id: DocumentId(1),
            category: AlertType::Opinion,
            case_name: case_name.to_string(),
            url: "/opinion/1/".to_string(),
            excerpt: excerpt.to_string(),
            court: "SCOTUS".to_string(),
            event_date: None,
        }
    }

    #[test]
    fn matches_when_all_terms_present() {
        let store = store_with(&[(1, "q=roe+wade", Rate::Daily, AlertType::Opinion)]);
        let matcher = DevMatcher::new(store);

        let page = matcher
            .percolate(&opinion("Roe v. Wade", ""), None, 10)
            .unwrap();
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].alert_id, AlertId(1));
    }

    #[test]
    fn no_match_when_a_term_is_missing() {
        let store = store_with(&[(1, "q=roe+casey", Rate::Daily, AlertType::Opinion)]);
        let matcher = DevMatcher::new(store);

        let page = matcher
            .percolate(&opinion("Roe v. Wade", ""), None, 10)
            .unwrap();
        assert!(page.hits.is_empty());
    }

    #[test]
    fn category_must_match() {
        let store = store_with(&[(1, "q=roe", Rate::Daily, AlertType::OralArgument)]);
        let matcher = DevMatcher::new(store);

        let page = matcher
            .percolate(&opinion("Roe v. Wade", ""), None, 10)
            .unwrap();
        assert!(page.hits.is_empty());
    }

    #[test]
    fn off_alerts_never_match() {
        let store = store_with(&[(1, "q=roe", Rate::Off, AlertType::Opinion)]);
        let matcher = DevMatcher::new(store);

        let page = matcher
            .percolate(&opinion("Roe v. Wade", ""), None, 10)
            .unwrap();
        assert!(page.hits.is_empty());
    }

    #[test]
    fn highlights_wrap_matched_terms() {
        let store = store_with(&[(1, "q=roe", Rate::Daily, AlertType::Opinion)]);
        let matcher = DevMatcher::new(store);

        let page = matcher
            .percolate(&opinion("Roe v. Wade", "Roe was argued"), None, 10)
            .unwrap();
        let highlights = &page.hits[0].highlights;
        assert_eq!(
            highlights.get("caseName").unwrap()[0],
            "<strong>Roe</strong> v. Wade"
        );
        assert_eq!(
            highlights.get("text").unwrap()[0],
            "<strong>Roe</strong> was argued"
        );
    }

    #[test]
    fn pagination_covers_all_matches() {
        let alerts: Vec<(u64, &str, Rate, AlertType)> = (1..=7)
            .map(|id| (id, "q=roe", Rate::Daily, AlertType::Opinion))
            .collect();
        let matcher = DevMatcher::new(store_with(&alerts));
        let doc = opinion("Roe v. Wade", "");

        let first = matcher.percolate(&doc, None, 3).unwrap();
        assert_eq!(first.hits.len(), 3);
        let second = matcher.percolate(&doc, first.next, 3).unwrap();
        assert_eq!(second.hits.len(), 3);
        let third = matcher.percolate(&doc, second.next, 3).unwrap();
        assert_eq!(third.hits.len(), 1);
        assert!(third.next.is_none());
    }

    #[test]
    fn query_terms_parse() {
        assert_eq!(query_terms("q=fourth+amendment&type=o"), vec!["fourth", "amendment"]);
        assert_eq!(query_terms("type=o"), Vec::<String>::new());
        assert_eq!(query_terms("q="), Vec::<String>::new());
    }
}
