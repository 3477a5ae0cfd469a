use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ── Label types ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub route: String,
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabel {
    pub operation: String,
}

// ── Metrics registry ───────────────────────────────────────────────────────────

pub struct TrackerMetrics {
    pub registry: Registry,

    pub http_requests: Family<HttpLabel, Counter>,

    // Ticket outcomes
    pub tickets_created: Counter,
    pub duplicates_detected: Counter,
    pub comments_added: Counter,
    pub tickets_closed: Counter,

    // Upstream failures by operation
    pub github_errors: Family<OperationLabel, Counter>,

    // Set on each scrape
    pub uptime_seconds: Gauge,
}

impl TrackerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests: Family<HttpLabel, Counter> = Family::default();
        registry.register(
            "tripwire_tracker_http_requests",
            "HTTP requests by method, route and status",
            http_requests.clone(),
        );

        let tickets_created: Counter = Counter::default();
        registry.register(
            "tripwire_tracker_tickets_created",
            "Issues created on GitHub",
            tickets_created.clone(),
        );

        let duplicates_detected: Counter = Counter::default();
        registry.register(
            "tripwire_tracker_duplicates_detected",
            "Creation requests refused as duplicates of an open issue",
            duplicates_detected.clone(),
        );

        let comments_added: Counter = Counter::default();
        registry.register(
            "tripwire_tracker_comments_added",
            "Comments posted to issues",
            comments_added.clone(),
        );

        let tickets_closed: Counter = Counter::default();
        registry.register(
            "tripwire_tracker_tickets_closed",
            "Issues closed",
            tickets_closed.clone(),
        );

        let github_errors: Family<OperationLabel, Counter> = Family::default();
        registry.register(
            "tripwire_tracker_github_errors",
            "Failed GitHub API calls by operation",
            github_errors.clone(),
        );

        let uptime_seconds: Gauge = Gauge::default();
        registry.register(
            "tripwire_tracker_uptime_seconds",
            "Seconds since the tracker service started",
            uptime_seconds.clone(),
        );

        Self {
            registry,
            http_requests,
            tickets_created,
            duplicates_detected,
            comments_added,
            tickets_closed,
            github_errors,
            uptime_seconds,
        }
    }

    pub fn record_request(&self, method: &str, route: &str, status: u16) {
        self.http_requests
            .get_or_create(&HttpLabel {
                method: method.to_string(),
                route: route.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    pub fn record_github_error(&self, operation: &str) {
        self.github_errors
            .get_or_create(&OperationLabel {
                operation: operation.to_string(),
            })
            .inc();
    }

    /// Text exposition format.
    pub fn render(&self, uptime_secs: u64) -> Result<String, std::fmt::Error> {
        self.uptime_seconds.set(uptime_secs as i64);
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
