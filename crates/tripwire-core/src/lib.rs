pub mod types;
pub mod error;
pub mod sources;
pub mod dedup;
pub mod decision;
pub mod report;
pub mod poller;

pub use error::{Collaborator, Result, TripwireError};
pub use types::*;
pub use sources::{
    bounded, ensure_tracker_healthy, AnalysisEngine, CallTimeouts, IssueTracker, LogSource,
    SUMMARY_ERROR,
};
pub use dedup::{
    normalize_title, similarity, title_similarity, DuplicateChecker, DuplicateCheckerConfig,
    RecencySuppressor, SimilarMatch, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_SUPPRESSION_TTL,
    DEFAULT_TRACKER_LABEL,
};
pub use decision::{Decision, DecisionConfig, DecisionEngine, DecisionOutcome, SkipReason};
pub use report::{
    format_logs_for_analysis, format_logs_for_display, format_metrics, render_ticket,
    TicketContext,
};
pub use poller::{
    CycleEvent, CycleOutcome, CycleReport, CycleState, Poller, PollerConfig, PollerMetrics,
};
