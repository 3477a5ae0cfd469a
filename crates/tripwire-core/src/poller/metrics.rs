use crate::decision::SkipReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Cumulative counters for the polling loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollerMetrics {
    /// Total cycles started.
    pub cycles: u64,

    /// Cycles that found no error logs.
    pub empty_cycles: u64,

    /// Cycles aborted by a collaborator failure.
    pub failed_cycles: u64,

    /// Tickets confirmed new by the tracker.
    pub tickets_created: u64,

    /// Skips by reason label.
    pub skips: BTreeMap<String, u64>,

    /// Processing time for the last cycle.
    #[serde(with = "duration_serializer")]
    pub last_cycle_duration: Duration,

    /// When the last cycle finished.
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl PollerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_cycle(&mut self) {
        self.cycles += 1;
    }

    pub fn record_empty(&mut self) {
        self.empty_cycles += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_cycles += 1;
    }

    pub fn record_created(&mut self) {
        self.tickets_created += 1;
    }

    pub fn record_skip(&mut self, reason: &SkipReason) {
        *self.skips.entry(reason.as_str().to_string()).or_insert(0) += 1;
    }

    pub fn skipped(&self, reason: &str) -> u64 {
        self.skips.get(reason).copied().unwrap_or(0)
    }

    pub fn finish_cycle(&mut self, duration: Duration) {
        self.last_cycle_duration = duration;
        self.last_cycle_at = Some(Utc::now());
    }

    /// Get a summary string for logging
    pub fn summary(&self) -> String {
        let skipped: u64 = self.skips.values().sum();
        format!(
            "Cycle #{}: {} tickets created, {} skipped, {} empty, {} failed | last cycle {:?}",
            self.cycles,
            self.tickets_created,
            skipped,
            self.empty_cycles,
            self.failed_cycles,
            self.last_cycle_duration
        )
    }
}

mod duration_serializer {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
