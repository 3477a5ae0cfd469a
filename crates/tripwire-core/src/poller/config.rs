use crate::error::{Result, TripwireError};
use std::time::Duration;

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Service whose logs are watched.
    pub service_name: String,

    /// Time between cycles. Default: 300 seconds.
    pub interval: Duration,

    /// Lookback for each error-log fetch, in minutes. Default: 15.
    pub window_minutes: u64,

    /// Shortened sleep after a failed cycle. Default: 60 seconds.
    pub recovery_delay: Duration,

    /// Deadline for each log-source call. Default: 30 seconds.
    pub log_fetch_timeout: Duration,

    /// Deadline for each analysis call. Default: 120 seconds.
    pub analysis_timeout: Duration,

    /// Ask the log source for metrics to include in the analysis prompt.
    pub include_metrics: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            service_name: "rightstep-app".to_string(),
            interval: Duration::from_secs(300),
            window_minutes: 15,
            recovery_delay: Duration::from_secs(60),
            log_fetch_timeout: Duration::from_secs(30),
            analysis_timeout: Duration::from_secs(120),
            include_metrics: true,
        }
    }
}

impl PollerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_window_minutes(mut self, minutes: u64) -> Self {
        self.window_minutes = minutes;
        self
    }

    pub fn with_recovery_delay(mut self, delay: Duration) -> Self {
        self.recovery_delay = delay;
        self
    }

    pub fn with_log_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.log_fetch_timeout = timeout;
        self
    }

    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(TripwireError::Config("service_name must not be empty".into()));
        }

        if self.interval.is_zero() {
            return Err(TripwireError::Config("polling interval must be > 0".into()));
        }

        if self.window_minutes == 0 {
            return Err(TripwireError::Config("detection window must be > 0 minutes".into()));
        }

        if self.recovery_delay.is_zero() {
            return Err(TripwireError::Config("recovery delay must be > 0".into()));
        }

        if self.log_fetch_timeout.is_zero() || self.analysis_timeout.is_zero() {
            return Err(TripwireError::Config("call timeouts must be > 0".into()));
        }

        Ok(())
    }
}
