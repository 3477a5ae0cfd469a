//! ClickHouse log source over the HTTP interface.

use crate::config::LogSourceConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tripwire_core::{LogBatch, LogEntry, LogSource, Result, TripwireError};

const ERROR_LOG_LIMIT: usize = 100;
const ALL_LOG_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
struct LogRow {
    #[serde(deserialize_with = "nanos_from_number_or_string")]
    timestamp: i64,
    #[serde(default)]
    severity_text: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
}

/// ClickHouse quotes 64-bit integers in JSON output by default.
fn nanos_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

impl LogRow {
    fn into_entry(self, service: &str) -> LogEntry {
        let entry = LogEntry::from_nanos(self.timestamp, self.severity_text, self.body)
            .with_service(service);
        if self.trace_id.is_empty() {
            entry
        } else {
            let span = (!self.span_id.is_empty()).then_some(self.span_id);
            entry.with_trace(self.trace_id, span)
        }
    }
}

/// Escape a value for a single-quoted ClickHouse string literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn window_bounds_nanos(now: DateTime<Utc>, window_minutes: u64) -> (i64, i64) {
    let end = now.timestamp_nanos_opt().unwrap_or(i64::MAX);
    let span = (window_minutes as i64).saturating_mul(60 * 1_000_000_000);
    (end.saturating_sub(span), end)
}

pub struct ClickHouseSource {
    http: reqwest::Client,
    endpoint: String,
    config: LogSourceConfig,
}

impl ClickHouseSource {
    pub fn new(config: LogSourceConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        let endpoint = format!("http://{}:{}/", config.host, config.port);
        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    /// Point at an explicit HTTP endpoint instead of `host:port`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn logs_query(&self, service: &str, window_minutes: u64, errors_only: bool) -> String {
        let (start, end) = window_bounds_nanos(Utc::now(), window_minutes);
        let severity = if errors_only {
            "\n  AND severity_text IN ('ERROR', 'error', 'Error')"
        } else {
            ""
        };
        let limit = if errors_only { ERROR_LOG_LIMIT } else { ALL_LOG_LIMIT };

        format!(
            "SELECT timestamp, severity_text, severity_number, body, trace_id, span_id, resources_string\n\
             FROM {}.{}\n\
             WHERE timestamp >= {}\n  AND timestamp <= {}\n  \
             AND resources_string['service.name'] = '{}'{}\n\
             ORDER BY timestamp DESC\n\
             LIMIT {}\n\
             FORMAT JSONEachRow",
            self.config.database,
            self.config.table,
            start,
            end,
            escape_literal(service),
            severity,
            limit
        )
    }

    async fn query_rows(&self, query: String) -> Result<Vec<LogRow>> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .query(&[("database", self.config.database.as_str())])
            .body(query);
        if let Some(user) = &self.config.user {
            request = request.header("X-ClickHouse-User", user);
        }
        if let Some(password) = &self.config.password {
            request = request.header("X-ClickHouse-Key", password);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| TripwireError::LogSource(format!("ClickHouse unreachable: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| TripwireError::LogSource(format!("ClickHouse read failed: {}", e)))?;

        if !status.is_success() {
            return Err(TripwireError::LogSource(format!(
                "ClickHouse returned {}: {}",
                status,
                text.trim()
            )));
        }

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<LogRow>(line)
                    .map_err(|e| TripwireError::LogSource(format!("unexpected ClickHouse row: {}", e)))
            })
            .collect()
    }

    async fn fetch(&self, service: &str, window_minutes: u64, errors_only: bool) -> Result<LogBatch> {
        let rows = self
            .query_rows(self.logs_query(service, window_minutes, errors_only))
            .await?;
        log::debug!("ClickHouse returned {} rows for '{}'", rows.len(), service);
        Ok(LogBatch::new(
            rows.into_iter().map(|row| row.into_entry(service)).collect(),
        ))
    }

    /// Reachability probe for `doctor`.
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.endpoint.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TripwireError::LogSource(format!("ClickHouse unreachable: {}", e)))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TripwireError::LogSource(format!(
                "ClickHouse ping returned {}",
                resp.status()
            )))
        }
    }
}

#[async_trait]
impl LogSource for ClickHouseSource {
    fn name(&self) -> &str {
        "clickhouse"
    }

    async fn fetch_error_logs(&self, service: &str, window_minutes: u64) -> Result<LogBatch> {
        self.fetch(service, window_minutes, true).await
    }

    async fn fetch_all_logs(&self, service: &str, window_minutes: u64) -> Result<Option<LogBatch>> {
        self.fetch(service, window_minutes, false).await.map(Some)
    }
}
