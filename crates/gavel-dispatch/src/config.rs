//! Engine limits.

/// Tunable bounds for dispatch and batch runs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Matches fetched per percolator page.
    pub percolator_page_size: usize,
    /// Ledger rows fetched per page during batch selection.
    pub ledger_page_size: usize,
    /// Documents shown per alert in an email; beyond it the count reads "N+".
    pub email_display_cap: usize,
    /// Documents carried per alert in a webhook payload.
    pub webhook_hit_cap: usize,
    /// SENT ledger rows older than this many days are purged.
    pub sent_retention_days: i64,
    /// SCHEDULED ledger rows older than this many days are purged.
    pub scheduled_retention_days: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            percolator_page_size: 100,
            ledger_page_size: 500,
            email_display_cap: 20,
            webhook_hit_cap: 100,
            sent_retention_days: 90,
            scheduled_retention_days: 180,
        }
    }
}
