use crate::error::{Result, TripwireError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Severity / priority ──────────────────────────────────────────────────────

/// Incident severity as judged by the analysis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = TripwireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(TripwireError::MalformedVerdict(format!(
                "unknown severity '{}'",
                other
            ))),
        }
    }
}

/// Suggested ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::P1
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TripwireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "P0" => Ok(Priority::P0),
            "P1" => Ok(Priority::P1),
            "P2" => Ok(Priority::P2),
            "P3" => Ok(Priority::P3),
            other => Err(TripwireError::MalformedVerdict(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}

// ── Logs ─────────────────────────────────────────────────────────────────────

/// A single log record pulled from the log store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Nanosecond-resolution instant.
    pub timestamp: DateTime<Utc>,
    pub severity: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

impl LogEntry {
    pub fn new(timestamp: DateTime<Utc>, severity: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            timestamp,
            severity: severity.into(),
            body: body.into(),
            trace_id: None,
            span_id: None,
            service_name: None,
        }
    }

    /// Build from a raw nanosecond epoch timestamp, as stored by the log store.
    pub fn from_nanos(nanos: i64, severity: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(DateTime::from_timestamp_nanos(nanos), severity, body)
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service_name = Some(service.into());
        self
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: Option<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = span_id;
        self
    }
}

/// Log entries for one detection window, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogBatch {
    pub entries: Vec<LogEntry>,
}

impl LogBatch {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&LogEntry> {
        self.entries.first()
    }

    pub fn oldest(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
}

/// Service-level metrics, when the log store can provide them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub error_rate: Option<f64>,
    pub call_rate: Option<f64>,
    pub p99: Option<f64>,
    pub p95: Option<f64>,
    pub p50: Option<f64>,
}

// ── Verdict ──────────────────────────────────────────────────────────────────

/// The analysis engine's judgement for one batch of logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisVerdict {
    pub should_create_issue: bool,
    pub severity: Severity,
    pub issue_title: String,
    pub issue_description: String,
    pub error_pattern: String,
    pub affected_endpoints: Vec<String>,
    pub suggested_priority: Priority,
    pub root_cause_hypothesis: String,
    pub recommendation: String,
}

/// Wire shape of a verdict before validation. Every field is optional so
/// that missing fields produce a `MalformedVerdict` instead of a serde error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    should_create_issue: Option<bool>,
    severity: Option<String>,
    issue_title: Option<String>,
    issue_description: Option<String>,
    error_pattern: Option<String>,
    affected_endpoints: Option<Vec<String>>,
    suggested_priority: Option<String>,
    root_cause_hypothesis: Option<String>,
    recommendation: Option<String>,
}

impl AnalysisVerdict {
    /// Parse the engine's JSON reply. `shouldCreateIssue`, `severity` and
    /// `issueTitle` are required; everything else falls back to a default.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawVerdict = serde_json::from_str(text.trim())
            .map_err(|e| TripwireError::MalformedVerdict(format!("not a JSON verdict: {}", e)))?;

        let should_create_issue = raw
            .should_create_issue
            .ok_or_else(|| TripwireError::MalformedVerdict("missing shouldCreateIssue".into()))?;
        let severity: Severity = raw
            .severity
            .as_deref()
            .ok_or_else(|| TripwireError::MalformedVerdict("missing severity".into()))?
            .parse()?;
        let issue_title = raw
            .issue_title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TripwireError::MalformedVerdict("missing issueTitle".into()))?;
        let suggested_priority = match raw.suggested_priority.as_deref() {
            Some(p) => p.parse().unwrap_or_default(),
            None => Priority::default(),
        };

        Ok(Self {
            should_create_issue,
            severity,
            issue_title,
            issue_description: raw.issue_description.unwrap_or_default(),
            error_pattern: raw.error_pattern.unwrap_or_default(),
            affected_endpoints: raw.affected_endpoints.unwrap_or_default(),
            suggested_priority,
            root_cause_hypothesis: raw.root_cause_hypothesis.unwrap_or_default(),
            recommendation: raw.recommendation.unwrap_or_default(),
        })
    }

    /// Identity used by the recency suppressor: raw severity and title, no normalization.
    pub fn suppression_key(&self) -> String {
        format!("{}-{}", self.severity, self.issue_title)
    }
}

// ── Tickets ──────────────────────────────────────────────────────────────────

/// Read-only projection of an open ticket, fetched per duplicate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSummary {
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A ticket the orchestrator wants the tracker to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    /// Ask the tracker to run its own duplicate check before creating.
    pub check_duplicate: bool,
}

/// Tracker confirmation of a created ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTicket {
    pub number: u64,
    pub url: String,
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

/// Ticket the tracker pointed at when it refused a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingTicket {
    pub number: u64,
    pub url: String,
    pub title: String,
}

/// Result of a creation request.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(CreatedTicket),
    Duplicate(ExistingTicket),
}

impl CreateOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}
