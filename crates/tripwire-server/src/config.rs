use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tripwire_core::{
    CallTimeouts, DecisionConfig, PollerConfig, TicketContext, TripwireError,
    DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TRACKER_LABEL,
};

/// Top-level tripwire.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TripwireConfig {
    pub analyzer: AnalyzerConfig,
    pub log_source: LogSourceConfig,
    pub analysis: AnalysisConfig,
    pub tracker: TrackerConfig,
    pub github: GitHubConfig,
    pub server: ServerConfig,
}

/// The polling loop and its decision policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub service_name: String,
    pub poll_interval_secs: u64,
    pub window_minutes: u64,
    pub recovery_delay_secs: u64,
    pub suppression_ttl_secs: u64,
    pub similarity_threshold: f64,
    pub include_metrics: bool,
    /// Linked from every ticket body.
    pub repo_url: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            service_name: "rightstep-app".into(),
            poll_interval_secs: 300,
            window_minutes: 15,
            recovery_delay_secs: 60,
            suppression_ttl_secs: 2 * 60 * 60,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            include_metrics: true,
            repo_url: "https://github.com/owner/repo".into(),
        }
    }
}

/// ClickHouse HTTP interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSourceConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LogSourceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8123,
            database: "signoz_logs".into(),
            table: "logs_v2".into(),
            user: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4-turbo-preview".into(),
            base_url: "https://api.openai.com/v1".into(),
            temperature: 0.3,
            timeout_secs: 120,
        }
    }
}

/// Where `watch` finds the tracker service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub url: String,
    pub label: String,
    pub health_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub create_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3001".into(),
            label: DEFAULT_TRACKER_LABEL.into(),
            health_timeout_secs: 5,
            read_timeout_secs: 10,
            create_timeout_secs: 30,
        }
    }
}

/// Credentials the tracker service uses against GitHub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            api_url: "https://api.github.com".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
        }
    }
}

const REDACTED: &str = "********";

impl TripwireConfig {
    /// Parse a config file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Like `load`, but a missing file means defaults. A malformed file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        log::debug!("{} not found, using defaults", path.display());
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay the deployment environment variables. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SERVICE_NAME") {
            self.analyzer.service_name = v;
        }
        if let Some(v) = get("POLLING_INTERVAL") {
            let millis: u64 = v
                .parse()
                .with_context(|| format!("POLLING_INTERVAL must be milliseconds, got '{}'", v))?;
            self.analyzer.poll_interval_secs = (millis / 1000).max(1);
        }
        if let Some(v) = get("CHECK_INTERVAL") {
            self.analyzer.window_minutes = v
                .parse()
                .with_context(|| format!("CHECK_INTERVAL must be minutes, got '{}'", v))?;
        }
        if let Some(v) = get("REPO_URL") {
            self.analyzer.repo_url = v;
        }
        if let Some(v) = get("CLICKHOUSE_HOST") {
            self.log_source.host = v;
        }
        if let Some(v) = get("CLICKHOUSE_PORT") {
            self.log_source.port = v
                .parse()
                .with_context(|| format!("CLICKHOUSE_PORT must be a port, got '{}'", v))?;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.analysis.api_key = Some(v);
        }
        if let Some(v) = get("AI_MODEL") {
            self.analysis.model = v;
        }
        if let Some(v) = get("GITHUB_SERVICE_URL") {
            self.tracker.url = v;
        }
        if let Some(v) = get("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = get("GITHUB_OWNER") {
            self.github.owner = Some(v);
        }
        if let Some(v) = get("GITHUB_REPO") {
            self.github.repo = Some(v);
        }
        if let Some(v) = get("PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("PORT must be a port, got '{}'", v))?;
        }

        Ok(())
    }

    /// Requirements for `tripwire watch`.
    pub fn validate_for_watch(&self) -> std::result::Result<(), TripwireError> {
        let mut missing = Vec::new();
        if is_blank(&self.analysis.api_key) {
            missing.push("analysis.api_key (OPENAI_API_KEY)");
        }
        if self.tracker.url.trim().is_empty() {
            missing.push("tracker.url (GITHUB_SERVICE_URL)");
        }
        if !missing.is_empty() {
            return Err(TripwireError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if !(0.0..=1.0).contains(&self.analyzer.similarity_threshold) {
            return Err(TripwireError::Config(format!(
                "analyzer.similarity_threshold must be within [0, 1], got {}",
                self.analyzer.similarity_threshold
            )));
        }

        self.poller_config().validate()
    }

    /// Requirements for `tripwire tracker`.
    pub fn validate_for_tracker(&self) -> std::result::Result<(), TripwireError> {
        let mut missing = Vec::new();
        if is_blank(&self.github.token) {
            missing.push("github.token (GITHUB_TOKEN)");
        }
        if is_blank(&self.github.owner) {
            missing.push("github.owner (GITHUB_OWNER)");
        }
        if is_blank(&self.github.repo) {
            missing.push("github.repo (GITHUB_REPO)");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TripwireError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn timeouts(&self) -> CallTimeouts {
        CallTimeouts {
            health: Duration::from_secs(self.tracker.health_timeout_secs),
            tracker_read: Duration::from_secs(self.tracker.read_timeout_secs),
            ticket_create: Duration::from_secs(self.tracker.create_timeout_secs),
            log_fetch: Duration::from_secs(self.log_source.timeout_secs),
            analysis: Duration::from_secs(self.analysis.timeout_secs),
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        let mut config = PollerConfig::new(&self.analyzer.service_name)
            .with_interval(Duration::from_secs(self.analyzer.poll_interval_secs))
            .with_window_minutes(self.analyzer.window_minutes)
            .with_recovery_delay(Duration::from_secs(self.analyzer.recovery_delay_secs))
            .with_log_fetch_timeout(Duration::from_secs(self.log_source.timeout_secs))
            .with_analysis_timeout(Duration::from_secs(self.analysis.timeout_secs));
        config.include_metrics = self.analyzer.include_metrics;
        config
    }

    pub fn decision_config(&self) -> DecisionConfig {
        let timeouts = self.timeouts();
        DecisionConfig::new(TicketContext {
            service_name: self.analyzer.service_name.clone(),
            repo_url: self.analyzer.repo_url.clone(),
            label: self.tracker.label.clone(),
            window_minutes: self.analyzer.window_minutes,
        })
        .with_suppression_ttl(Duration::from_secs(self.analyzer.suppression_ttl_secs))
        .with_threshold(self.analyzer.similarity_threshold)
        .with_read_timeout(timeouts.tracker_read)
        .with_create_timeout(timeouts.ticket_create)
    }

    /// Copy with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |v: &mut Option<String>| {
            if v.is_some() {
                *v = Some(REDACTED.to_string());
            }
        };
        mask(&mut copy.analysis.api_key);
        mask(&mut copy.github.token);
        mask(&mut copy.log_source.password);
        copy
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_deployment() {
        let config = TripwireConfig::default();
        assert_eq!(config.analyzer.service_name, "rightstep-app");
        assert_eq!(config.analyzer.poll_interval_secs, 300);
        assert_eq!(config.analyzer.window_minutes, 15);
        assert_eq!(config.analyzer.suppression_ttl_secs, 7200);
        assert_eq!(config.analysis.model, "gpt-4-turbo-preview");
        assert_eq!(config.tracker.url, "http://localhost:3001");
        assert_eq!(config.tracker.label, "ai-detected");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.log_source.port, 8123);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[analyzer]
service_name = "orders-api"
window_minutes = 30

[github]
owner = "acme"
"#
        )
        .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let config: TripwireConfig = toml::from_str(&content).unwrap();

        assert_eq!(config.analyzer.service_name, "orders-api");
        assert_eq!(config.analyzer.window_minutes, 30);
        assert_eq!(config.analyzer.poll_interval_secs, 300);
        assert_eq!(config.github.owner.as_deref(), Some("acme"));
        assert_eq!(config.github.api_url, "https://api.github.com");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[analyzer\nservice_name = 1").unwrap();
        assert!(TripwireConfig::load_or_default(file.path()).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = TripwireConfig::default();
        config
            .apply_env(env(&[
                ("SERVICE_NAME", "billing"),
                ("POLLING_INTERVAL", "60000"),
                ("CHECK_INTERVAL", "5"),
                ("OPENAI_API_KEY", "sk-test"),
                ("GITHUB_SERVICE_URL", "http://tracker:3001"),
                ("PORT", "4000"),
                ("CLICKHOUSE_HOST", "clickhouse"),
            ]))
            .unwrap();

        assert_eq!(config.analyzer.service_name, "billing");
        assert_eq!(config.analyzer.poll_interval_secs, 60);
        assert_eq!(config.analyzer.window_minutes, 5);
        assert_eq!(config.analysis.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.tracker.url, "http://tracker:3001");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.log_source.host, "clickhouse");
    }

    #[test]
    fn env_rejects_garbage_numbers() {
        let mut config = TripwireConfig::default();
        assert!(config.apply_env(env(&[("POLLING_INTERVAL", "soon")])).is_err());
    }

    #[test]
    fn watch_requires_analysis_key() {
        let mut config = TripwireConfig::default();
        let err = config.validate_for_watch().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        config.analysis.api_key = Some("sk-test".into());
        assert!(config.validate_for_watch().is_ok());

        config.analyzer.similarity_threshold = 1.5;
        assert!(config.validate_for_watch().is_err());
    }

    #[test]
    fn tracker_requires_github_credentials() {
        let mut config = TripwireConfig::default();
        let err = config.validate_for_tracker().unwrap_err().to_string();
        assert!(err.contains("GITHUB_TOKEN"));
        assert!(err.contains("GITHUB_OWNER"));
        assert!(err.contains("GITHUB_REPO"));

        config.github.token = Some("ghp_x".into());
        config.github.owner = Some("acme".into());
        config.github.repo = Some("shop".into());
        assert!(config.validate_for_tracker().is_ok());
    }

    #[test]
    fn redaction_masks_secrets_only() {
        let mut config = TripwireConfig::default();
        config.analysis.api_key = Some("sk-secret".into());
        config.github.token = Some("ghp_secret".into());

        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(!shown.contains("ghp_secret"));
        assert!(shown.contains("rightstep-app"));
        assert_eq!(config.analysis.api_key.as_deref(), Some("sk-secret"));
    }

    #[test]
    fn decision_config_follows_analyzer_settings() {
        let mut config = TripwireConfig::default();
        config.analyzer.similarity_threshold = 0.8;
        config.tracker.label = "ops".into();

        let decision = config.decision_config();
        assert_eq!(decision.checker.threshold, 0.8);
        assert_eq!(decision.checker.label, "ops");
        assert_eq!(decision.suppression_ttl, Duration::from_secs(7200));
        assert_eq!(decision.ticket.window_minutes, 15);
    }

    #[test]
    fn call_timeouts_reach_the_component_that_enforces_them() {
        let mut config = TripwireConfig::default();
        config.log_source.timeout_secs = 12;
        config.analysis.timeout_secs = 45;
        config.tracker.read_timeout_secs = 7;
        config.tracker.create_timeout_secs = 20;

        let poller = config.poller_config();
        assert_eq!(poller.log_fetch_timeout, Duration::from_secs(12));
        assert_eq!(poller.analysis_timeout, Duration::from_secs(45));

        let decision = config.decision_config();
        assert_eq!(decision.checker.read_timeout, Duration::from_secs(7));
        assert_eq!(decision.create_timeout, Duration::from_secs(20));
    }
}
