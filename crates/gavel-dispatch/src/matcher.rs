//! The percolator contract.
//!
//! Percolation runs one newly-arrived document against the stored query
//! corpus and returns the alerts that match — the inverse of a normal
//! search. A single document can fan out to thousands of alerts, so results
//! come back in cursor-keyed pages and the dispatcher drains every page.

use std::collections::BTreeMap;
use std::sync::Arc;

use gavel_alerts::{AlertId, DocumentId, DocumentRecord, Highlights};
use parking_lot::RwLock;

use crate::error::{DispatchError, Result};

/// Resumption point for percolator pagination.
///
/// The inner offset is meaningful only to the matcher that minted the token;
/// dispatchers pass it back verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken(pub usize);

/// One matched alert within a percolator page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Percolated {
    /// The alert whose stored query matched the document.
    pub alert_id: AlertId,
    /// Highlight fragments for the matched terms.
    pub highlights: Highlights,
}

/// One page of percolator results.
#[derive(Debug, Clone)]
pub struct MatchPage {
    /// The matches in this page.
    pub hits: Vec<Percolated>,
    /// Cursor for the next page, absent on the last page.
    pub next: Option<PageToken>,
}

/// Matches one document against the stored query corpus.
pub trait Matcher: Send + Sync {
    /// Returns one page of alerts whose queries match the document.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Matcher` when the percolator is unreachable;
    /// callers retry the whole entry point.
    fn percolate(
        &self,
        document: &DocumentRecord,
        page: Option<PageToken>,
        page_size: usize,
    ) -> Result<MatchPage>;
}

/// In-memory matcher with explicitly registered matches.
///
/// Used by tests and local wiring; a deployment implements [`Matcher`]
/// against its search cluster.
#[derive(Debug, Clone, Default)]
pub struct StaticMatcher {
    matches: Arc<RwLock<BTreeMap<DocumentId, Vec<Percolated>>>>,
    unavailable: Arc<RwLock<bool>>,
}

impl StaticMatcher {
    /// Creates a matcher with no registered matches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers that `alert_id` matches `document_id`.
    pub fn register(&self, document_id: DocumentId, alert_id: AlertId, highlights: Highlights) {
        self.matches
            .write()
            .entry(document_id)
            .or_default()
            .push(Percolated {
                alert_id,
                highlights,
            });
    }

    /// Simulates the percolator going down.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }
}

impl Matcher for StaticMatcher {
    fn percolate(
        &self,
        document: &DocumentRecord,
        page: Option<PageToken>,
        page_size: usize,
    ) -> Result<MatchPage> {
        if *self.unavailable.read() {
            return Err(DispatchError::Matcher {
                reason: "matcher marked unavailable".to_string(),
            });
        }

        let matches = self.matches.read();
        let all = matches.get(&document.id).map_or(&[][..], Vec::as_slice);
        let offset = page.map_or(0, |t| t.0);
        let hits: Vec<Percolated> = all.iter().skip(offset).take(page_size).cloned().collect();
        let consumed = offset + hits.len();
        let next = (consumed < all.len()).then_some(PageToken(consumed));
        Ok(MatchPage { hits, next })
    }
}
