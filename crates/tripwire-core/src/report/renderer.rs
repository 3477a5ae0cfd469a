use super::format::{format_logs_for_display, time_range, DISPLAY_LOG_LIMIT};
use crate::types::{AnalysisVerdict, LogBatch, NewTicket};
use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed facts about the deployment that every ticket mentions.
#[derive(Debug, Clone)]
pub struct TicketContext {
    pub service_name: String,
    pub repo_url: String,
    pub label: String,
    pub window_minutes: u64,
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// `[CRITICAL] Database Connection Pool Exhausted`
pub fn ticket_title(verdict: &AnalysisVerdict) -> String {
    format!(
        "[{}] {}",
        verdict.severity.as_str().to_uppercase(),
        verdict.issue_title
    )
}

/// Tracker label, severity, and lower-cased priority.
pub fn ticket_labels(verdict: &AnalysisVerdict, label: &str) -> Vec<String> {
    vec![
        label.to_string(),
        verdict.severity.as_str().to_string(),
        verdict.suggested_priority.as_str().to_lowercase(),
    ]
}

/// Markdown body: analysis sections followed by the detection footer.
pub fn ticket_body(
    verdict: &AnalysisVerdict,
    batch: &LogBatch,
    ctx: &TicketContext,
    detected_at: DateTime<Utc>,
) -> String {
    let error_count = batch.len();
    let range = time_range(batch, ctx.window_minutes);
    let sample = format_logs_for_display(batch, DISPLAY_LOG_LIMIT);
    let detected = detected_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let endpoints = if verdict.affected_endpoints.is_empty() {
        "Multiple endpoints".to_string()
    } else {
        verdict.affected_endpoints.join(", ")
    };

    let mut out = String::new();

    out.push_str("## Problem Description\n");
    out.push_str(or_default(
        &verdict.issue_description,
        "Critical errors detected in the application",
    ));
    out.push_str("\n\n");

    out.push_str("## Impact Assessment\n");
    out.push_str(&format!(
        "- **Severity**: {}\n",
        verdict.severity.as_str().to_uppercase()
    ));
    out.push_str(&format!("- **Priority**: {}\n", verdict.suggested_priority));
    out.push_str(&format!("- **Error Count**: {} errors in {}\n", error_count, range));
    out.push_str(&format!("- **Affected Components**: {}\n\n", endpoints));

    out.push_str("## Error Pattern\n```\n");
    out.push_str(or_default(
        &verdict.error_pattern,
        "Multiple error occurrences detected",
    ));
    out.push_str("\n```\n\n");

    out.push_str("## Error Logs\n<details>\n");
    out.push_str(&format!(
        "<summary>View Error Logs ({} total)</summary>\n\n```\n{}\n```\n</details>\n\n",
        error_count, sample
    ));

    out.push_str("## Root Cause Analysis\n");
    out.push_str(or_default(
        &verdict.root_cause_hypothesis,
        "Investigation required to determine root cause",
    ));
    out.push_str("\n\n");

    out.push_str("## Recommended Actions\n");
    out.push_str(or_default(
        &verdict.recommendation,
        "Immediate investigation required",
    ));
    out.push_str("\n\n");

    out.push_str("## Investigation Steps\n");
    out.push_str(&format!(
        "1. Check application logs for the time period: {}\n",
        range
    ));
    out.push_str("2. Review recent deployments or configuration changes\n");
    out.push_str("3. Check resource utilization (CPU, memory, disk)\n");
    out.push_str("4. Verify database connections and external service availability\n");
    out.push_str("5. Review error patterns and stack traces\n\n");

    out.push_str("## Related Links\n");
    out.push_str(&format!("- [Repository]({})\n\n", ctx.repo_url));

    out.push_str("---\n\n");
    out.push_str("**Auto-generated by tripwire**\n");
    out.push_str(&format!("- **Severity:** {}\n", verdict.severity));
    out.push_str(&format!("- **Priority:** {}\n", verdict.suggested_priority));
    out.push_str(&format!("- **Detected:** {}\n", detected));
    out.push_str(&format!("- **Service:** {}\n", ctx.service_name));
    out.push_str(&format!("- **Error Pattern:** {}\n\n", verdict.error_pattern));
    out.push_str("*This ticket was opened automatically from an error burst.*\n");

    out
}

/// Assemble the creation request for a verdict.
pub fn render_ticket(
    verdict: &AnalysisVerdict,
    batch: &LogBatch,
    ctx: &TicketContext,
    detected_at: DateTime<Utc>,
) -> NewTicket {
    NewTicket {
        title: ticket_title(verdict),
        body: ticket_body(verdict, batch, ctx, detected_at),
        labels: ticket_labels(verdict, &ctx.label),
        check_duplicate: true,
    }
}
