use crate::clickhouse::ClickHouseSource;
use crate::config::TripwireConfig;
use anyhow::Result;
use tripwire_client::TrackerClient;
use tripwire_core::ensure_tracker_healthy;

#[derive(Debug, PartialEq)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
    fix_hint: Option<String>,
}

impl CheckResult {
    fn ok(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
            fix_hint: None,
        }
    }

    fn failed(name: &str, status: CheckStatus, detail: impl Into<String>, hint: &str) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
            fix_hint: Some(hint.into()),
        }
    }
}

fn config_checks(config: &TripwireConfig) -> Vec<CheckResult> {
    let watch = match config.validate_for_watch() {
        Ok(()) => CheckResult::ok(
            "Watch configuration",
            format!(
                "service '{}', every {}s over {}m",
                config.analyzer.service_name,
                config.analyzer.poll_interval_secs,
                config.analyzer.window_minutes
            ),
        ),
        Err(e) => CheckResult::failed(
            "Watch configuration",
            CheckStatus::Error,
            e.to_string(),
            "Set the listed values in tripwire.toml or the environment",
        ),
    };

    // Only `tripwire tracker` needs GitHub credentials.
    let tracker = match config.validate_for_tracker() {
        Ok(()) => CheckResult::ok(
            "Tracker configuration",
            format!(
                "{}/{}",
                config.github.owner.as_deref().unwrap_or_default(),
                config.github.repo.as_deref().unwrap_or_default()
            ),
        ),
        Err(e) => CheckResult::failed(
            "Tracker configuration",
            CheckStatus::Warning,
            e.to_string(),
            "Needed only where `tripwire tracker` runs",
        ),
    };

    vec![watch, tracker]
}

async fn tracker_check(config: &TripwireConfig) -> CheckResult {
    const NAME: &str = "Tracker service reachable";
    let hint = "Start it with `tripwire tracker` or fix tracker.url";

    let client = match TrackerClient::new(&config.tracker.url) {
        Ok(client) => client,
        Err(e) => return CheckResult::failed(NAME, CheckStatus::Error, e.to_string(), hint),
    };
    match ensure_tracker_healthy(&client, &config.timeouts()).await {
        Ok(()) => CheckResult::ok(NAME, config.tracker.url.clone()),
        Err(e) => CheckResult::failed(NAME, CheckStatus::Error, e.to_string(), hint),
    }
}

async fn clickhouse_check(config: &TripwireConfig) -> CheckResult {
    const NAME: &str = "ClickHouse reachable";
    let hint = "Check log_source.host and log_source.port (CLICKHOUSE_HOST/CLICKHOUSE_PORT)";

    let source = match ClickHouseSource::new(config.log_source.clone()) {
        Ok(source) => source,
        Err(e) => return CheckResult::failed(NAME, CheckStatus::Error, format!("{:#}", e), hint),
    };
    match source.ping().await {
        Ok(()) => CheckResult::ok(NAME, source.endpoint().to_string()),
        Err(e) => CheckResult::failed(NAME, CheckStatus::Error, e.to_string(), hint),
    }
}

pub async fn run(config: TripwireConfig) -> Result<()> {
    println!();
    println!("Tripwire Health Check");
    println!("{}", "─".repeat(50));

    let mut results = config_checks(&config);
    let (tracker, clickhouse) = futures::join!(tracker_check(&config), clickhouse_check(&config));
    results.push(tracker);
    results.push(clickhouse);

    // Print results
    let mut has_errors = false;
    for r in &results {
        let symbol = match r.status {
            CheckStatus::Ok => "[✓]",
            CheckStatus::Warning => "[⚠]",
            CheckStatus::Error => {
                has_errors = true;
                "[✗]"
            }
        };
        println!("{} {}: {}", symbol, r.name, r.detail);
        if let Some(hint) = &r.fix_hint {
            println!("    → {}", hint);
        }
    }

    println!("{}", "─".repeat(50));

    if has_errors {
        std::process::exit(1);
    }

    Ok(())
}
