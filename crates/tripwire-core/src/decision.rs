//! Create-or-skip policy for one analysis verdict.
//!
//! Order of checks: severity and actionability, then the in-process recency
//! suppressor (raw key), then the tracker-side similarity check (normalized
//! titles). Only a confirmed, genuinely new ticket is remembered.

use crate::dedup::{DuplicateChecker, DuplicateCheckerConfig, RecencySuppressor, DEFAULT_SUPPRESSION_TTL};
use crate::error::{Collaborator, Result};
use crate::report::{render_ticket, TicketContext};
use crate::sources::{bounded, IssueTracker};
use crate::types::{AnalysisVerdict, CreateOutcome, CreatedTicket, LogBatch, Severity};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Why a verdict did not produce a ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    LowSeverity,
    NotActionable,
    /// Same severity and title created within the suppression window.
    RecentlyHandled { key: String },
    /// An open labeled ticket already covers the title.
    SimilarOpenTicket { number: u64, title: String, score: f64 },
    /// The tracker refused creation as a duplicate of an existing ticket.
    TrackerDuplicate { number: u64 },
    /// The analysis engine's reply could not be used.
    MalformedVerdict(String),
}

impl SkipReason {
    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::LowSeverity => "low_severity",
            SkipReason::NotActionable => "not_actionable",
            SkipReason::RecentlyHandled { .. } => "recently_handled",
            SkipReason::SimilarOpenTicket { .. } => "similar_open_ticket",
            SkipReason::TrackerDuplicate { .. } => "tracker_duplicate",
            SkipReason::MalformedVerdict(_) => "malformed_verdict",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Create,
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Created(CreatedTicket),
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub checker: DuplicateCheckerConfig,
    pub suppression_ttl: Duration,
    pub ticket: TicketContext,
    pub create_timeout: Duration,
}

impl DecisionConfig {
    pub fn new(ticket: TicketContext) -> Self {
        let checker = DuplicateCheckerConfig {
            label: ticket.label.clone(),
            ..Default::default()
        };
        Self {
            checker,
            suppression_ttl: DEFAULT_SUPPRESSION_TTL,
            ticket,
            create_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_suppression_ttl(mut self, ttl: Duration) -> Self {
        self.suppression_ttl = ttl;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.checker.threshold = threshold;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.checker.read_timeout = timeout;
        self
    }

    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }
}

pub struct DecisionEngine<T: IssueTracker> {
    tracker: Arc<T>,
    checker: DuplicateChecker<T>,
    suppressor: RecencySuppressor,
    ticket: TicketContext,
    create_timeout: Duration,
}

impl<T: IssueTracker> DecisionEngine<T> {
    pub fn new(tracker: Arc<T>, config: DecisionConfig) -> Self {
        let checker = DuplicateChecker::new(tracker.clone(), config.checker);
        Self {
            tracker,
            checker,
            suppressor: RecencySuppressor::new(config.suppression_ttl),
            ticket: config.ticket,
            create_timeout: config.create_timeout,
        }
    }

    pub fn suppressor(&self) -> &RecencySuppressor {
        &self.suppressor
    }

    pub fn suppressor_mut(&mut self) -> &mut RecencySuppressor {
        &mut self.suppressor
    }

    pub fn ticket_context(&self) -> &TicketContext {
        &self.ticket
    }

    /// Whether this verdict warrants a new ticket. Never fails: the
    /// tracker-side check fails open.
    pub async fn decide(&mut self, verdict: &AnalysisVerdict) -> Decision {
        if verdict.severity == Severity::Low {
            return Decision::Skip(SkipReason::LowSeverity);
        }
        if !verdict.should_create_issue {
            return Decision::Skip(SkipReason::NotActionable);
        }

        let key = verdict.suppression_key();
        if self.suppressor.contains(&key) {
            log::debug!("Skipping '{}': handled within the suppression window", key);
            return Decision::Skip(SkipReason::RecentlyHandled { key });
        }

        if let Some(found) = self.checker.find_similar(&verdict.issue_title).await {
            log::info!(
                "Similar ticket already open for '{}': #{}",
                verdict.issue_title,
                found.number
            );
            return Decision::Skip(SkipReason::SimilarOpenTicket {
                number: found.number,
                title: found.title,
                score: found.score,
            });
        }

        Decision::Create
    }

    /// Open the ticket. The suppression key is recorded only when the
    /// tracker confirms a new ticket.
    pub async fn create(
        &mut self,
        verdict: &AnalysisVerdict,
        batch: &LogBatch,
    ) -> Result<DecisionOutcome> {
        let ticket = render_ticket(verdict, batch, &self.ticket, Utc::now());

        let outcome = bounded(
            Collaborator::Tracker,
            self.create_timeout,
            self.tracker.create_ticket(&ticket),
        )
        .await
        .map_err(|e| {
            log::error!("Ticket creation failed for '{}': {}", ticket.title, e);
            e
        })?;

        match outcome {
            CreateOutcome::Created(created) => {
                log::info!("Ticket created: #{} {}", created.number, created.url);
                self.suppressor.insert(verdict.suppression_key());
                Ok(DecisionOutcome::Created(created))
            }
            CreateOutcome::Duplicate(existing) => {
                log::info!(
                    "Tracker reported '{}' as a duplicate of #{}",
                    ticket.title,
                    existing.number
                );
                Ok(DecisionOutcome::Skipped(SkipReason::TrackerDuplicate {
                    number: existing.number,
                }))
            }
        }
    }

    /// Decide, then create when warranted.
    pub async fn handle(
        &mut self,
        verdict: &AnalysisVerdict,
        batch: &LogBatch,
    ) -> Result<DecisionOutcome> {
        match self.decide(verdict).await {
            Decision::Create => self.create(verdict, batch).await,
            Decision::Skip(reason) => Ok(DecisionOutcome::Skipped(reason)),
        }
    }
}
