use crate::types::{LogBatch, LogEntry, ServiceMetrics};
use chrono::SecondsFormat;

/// Entries included in the analysis prompt.
pub const ANALYSIS_LOG_LIMIT: usize = 20;

/// Entries shown in a ticket body.
pub const DISPLAY_LOG_LIMIT: usize = 10;

const NO_LOGS: &str = "No logs available";
const NO_METRICS: &str = "No metrics available";

fn level(entry: &LogEntry) -> &str {
    if entry.severity.is_empty() {
        "INFO"
    } else {
        &entry.severity
    }
}

fn timestamp(entry: &LogEntry) -> String {
    entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One line per entry, `[i] <time> | <level> | <body>`, newest first.
pub fn format_logs_for_analysis(batch: &LogBatch, limit: usize) -> String {
    if batch.is_empty() {
        return NO_LOGS.to_string();
    }

    batch
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, entry)| format!("[{}] {} | {} | {}", i + 1, timestamp(entry), level(entry), entry.body))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Same as the analysis format but with the level upper-cased and padded.
pub fn format_logs_for_display(batch: &LogBatch, limit: usize) -> String {
    if batch.is_empty() {
        return NO_LOGS.to_string();
    }

    batch
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "[{}] {} | {:<5} | {}",
                i + 1,
                timestamp(entry),
                level(entry).to_uppercase(),
                entry.body
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `HH:MM:SS - HH:MM:SS` from the oldest to the newest entry.
pub fn time_range(batch: &LogBatch, window_minutes: u64) -> String {
    match (batch.oldest(), batch.newest()) {
        (Some(first), Some(last)) => format!(
            "{} - {}",
            first.timestamp.format("%H:%M:%S"),
            last.timestamp.format("%H:%M:%S")
        ),
        _ => format!("last {} minutes", window_minutes),
    }
}

fn metric(value: Option<f64>) -> String {
    value
        .map(|v| format!("{}", v))
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn format_metrics(metrics: Option<&ServiceMetrics>) -> String {
    let Some(m) = metrics else {
        return NO_METRICS.to_string();
    };

    format!(
        "Service Overview:\n\
         - Error Rate: {}\n\
         - Request Rate: {}\n\
         - P99 Latency: {}ms\n\
         - P95 Latency: {}ms\n\
         - P50 Latency: {}ms\n",
        metric(m.error_rate),
        metric(m.call_rate),
        metric(m.p99),
        metric(m.p95),
        metric(m.p50),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(secs: i64, level: &str, body: &str) -> LogEntry {
        LogEntry::new(Utc.timestamp_opt(secs, 0).unwrap(), level, body)
    }

    #[test]
    fn analysis_lines_are_numbered_and_limited() {
        let batch = LogBatch::new(
            (0..30)
                .rev()
                .map(|i| entry(1_700_000_000 + i, "ERROR", "boom"))
                .collect(),
        );
        let text = format_logs_for_analysis(&batch, ANALYSIS_LOG_LIMIT);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 20);
        assert!(lines[0].starts_with("[1] 2023-11-14T22:13:49.000Z | ERROR | boom"));
    }

    #[test]
    fn display_pads_level() {
        let batch = LogBatch::new(vec![entry(0, "warn", "slow"), entry(0, "", "no level")]);
        let text = format_logs_for_display(&batch, DISPLAY_LOG_LIMIT);
        assert!(text.contains("| WARN  | slow"));
        assert!(text.contains("| INFO  | no level"));
    }

    #[test]
    fn empty_batch_placeholders() {
        let batch = LogBatch::empty();
        assert_eq!(format_logs_for_analysis(&batch, 20), "No logs available");
        assert_eq!(time_range(&batch, 15), "last 15 minutes");
    }

    #[test]
    fn time_range_spans_oldest_to_newest() {
        let batch = LogBatch::new(vec![entry(3_600 + 125, "ERROR", "b"), entry(3_600, "ERROR", "a")]);
        assert_eq!(time_range(&batch, 15), "01:00:00 - 01:02:05");
    }

    #[test]
    fn metrics_fall_back_to_na() {
        assert_eq!(format_metrics(None), "No metrics available");
        let text = format_metrics(Some(&ServiceMetrics {
            error_rate: Some(0.25),
            ..Default::default()
        }));
        assert!(text.contains("Error Rate: 0.25"));
        assert!(text.contains("P99 Latency: N/Ams"));
    }
}
