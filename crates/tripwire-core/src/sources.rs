//! Contracts for the three external collaborators the orchestrator drives.
//!
//! Adapters (ClickHouse, an OpenAI-compatible endpoint, the tracker service)
//! live outside this crate and implement these traits.

use crate::error::{Collaborator, Result, TripwireError};
use crate::types::{
    AnalysisVerdict, CreateOutcome, LogBatch, NewTicket, ServiceMetrics, TicketSummary,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Sentinel returned by [`AnalysisEngine::summarize`] when summarizing fails.
pub const SUMMARY_ERROR: &str = "Error summarizing logs";

/// Source of recent log entries for a service.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Adapter name (used in log lines).
    fn name(&self) -> &str;

    /// Error-level entries from the last `window_minutes`, newest first.
    async fn fetch_error_logs(&self, service: &str, window_minutes: u64) -> Result<LogBatch>;

    /// All entries from the last `window_minutes`. `None` when unsupported.
    async fn fetch_all_logs(&self, _service: &str, _window_minutes: u64) -> Result<Option<LogBatch>> {
        Ok(None)
    }

    /// Service metrics. `None` when unavailable; never fatal.
    async fn fetch_metrics(&self, _service: &str) -> Result<Option<ServiceMetrics>> {
        Ok(None)
    }
}

/// Language-model backed judge of log batches.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a verdict for the formatted log text.
    async fn analyze(&self, logs_text: &str, metrics_text: Option<&str>) -> Result<AnalysisVerdict>;

    /// Best-effort summary. Returns [`SUMMARY_ERROR`] instead of failing.
    async fn summarize(&self, logs_text: &str, max_chars: usize) -> String;
}

/// Ticket tracker operations the orchestrator consumes.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<CreateOutcome>;

    /// Open tickets carrying `label`.
    async fn list_open_tickets(&self, label: &str) -> Result<Vec<TicketSummary>>;

    async fn add_comment(&self, number: u64, text: &str) -> Result<()>;

    async fn close_ticket(&self, number: u64, comment: Option<&str>) -> Result<()>;

    /// Availability probe. `Ok(false)` means reachable but unhealthy.
    async fn health(&self) -> Result<bool>;
}

/// Per-call time limits. A timeout counts as that call's failure.
#[derive(Debug, Clone)]
pub struct CallTimeouts {
    pub health: Duration,
    pub tracker_read: Duration,
    pub ticket_create: Duration,
    pub log_fetch: Duration,
    pub analysis: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(5),
            tracker_read: Duration::from_secs(10),
            ticket_create: Duration::from_secs(30),
            log_fetch: Duration::from_secs(30),
            analysis: Duration::from_secs(120),
        }
    }
}

/// Run `fut` with a deadline, mapping expiry to [`TripwireError::Timeout`].
pub async fn bounded<T, F>(collaborator: Collaborator, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(TripwireError::Timeout {
            collaborator,
            after,
        }),
    }
}

/// Startup probe: the tracker must answer healthy within the health timeout.
pub async fn ensure_tracker_healthy<T: IssueTracker + ?Sized>(
    tracker: &T,
    timeouts: &CallTimeouts,
) -> Result<()> {
    match bounded(Collaborator::Tracker, timeouts.health, tracker.health()).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(TripwireError::Tracker("tracker reported unhealthy".into())),
        Err(e) => Err(TripwireError::Tracker(format!("tracker not accessible: {}", e))),
    }
}
