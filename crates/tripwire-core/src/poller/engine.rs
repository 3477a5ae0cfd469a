use crate::decision::{Decision, DecisionEngine, DecisionOutcome, SkipReason};
use crate::error::{Collaborator, Result, TripwireError};
use crate::poller::{transition, CycleEvent, CycleState, PollerConfig, PollerMetrics};
use crate::report::{format_logs_for_analysis, format_metrics, ANALYSIS_LOG_LIMIT};
use crate::sources::{bounded, AnalysisEngine, IssueTracker, LogSource};
use crate::types::{CreatedTicket, LogBatch};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

/// How a single cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No error logs in the detection window.
    NoLogs,
    Created(CreatedTicket),
    Skipped(SkipReason),
}

/// Trace of one cycle: the states it passed through and its result.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub states: Vec<CycleState>,
    pub outcome: CycleOutcome,
    pub log_count: usize,
    pub duration: Duration,
}

/// Drives fetch → analyze → decide → create, one cycle at a time.
pub struct Poller<L: LogSource, A: AnalysisEngine, T: IssueTracker> {
    log_source: Arc<L>,
    analysis: Arc<A>,
    decision: DecisionEngine<T>,
    config: PollerConfig,
    metrics: PollerMetrics,
    state: CycleState,
    trail: Vec<CycleState>,
}

impl<L: LogSource, A: AnalysisEngine, T: IssueTracker> Poller<L, A, T> {
    pub fn new(
        log_source: Arc<L>,
        analysis: Arc<A>,
        decision: DecisionEngine<T>,
        config: PollerConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            log_source,
            analysis,
            decision,
            config,
            metrics: PollerMetrics::new(),
            state: CycleState::Idle,
            trail: Vec::new(),
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn metrics(&self) -> &PollerMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn decision(&self) -> &DecisionEngine<T> {
        &self.decision
    }

    pub fn decision_mut(&mut self) -> &mut DecisionEngine<T> {
        &mut self.decision
    }

    fn advance(&mut self, event: CycleEvent) {
        let next = match transition(self.state, event) {
            Some(next) => next,
            None => {
                log::warn!(
                    "Ignoring unexpected event {:?} in state {}; resetting to idle",
                    event,
                    self.state
                );
                CycleState::Idle
            }
        };
        self.state = next;
        self.trail.push(next);
    }

    /// Run one complete cycle. Always leaves the poller in `Idle`.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = Instant::now();
        let cycle_id = Uuid::now_v7();

        self.state = CycleState::Idle;
        self.trail.clear();
        self.trail.push(CycleState::Idle);
        self.metrics.increment_cycle();

        let purged = self.decision.suppressor_mut().purge_expired(Instant::now());
        if purged > 0 {
            log::debug!("Expired {} suppression entries", purged);
        }

        self.advance(CycleEvent::Tick);
        let result = self.cycle_body().await;
        let duration = started.elapsed();
        self.metrics.finish_cycle(duration);

        match result {
            Ok((outcome, log_count)) => {
                match &outcome {
                    CycleOutcome::NoLogs => self.metrics.record_empty(),
                    CycleOutcome::Created(_) => self.metrics.record_created(),
                    CycleOutcome::Skipped(reason) => {
                        log::info!(
                            "Cycle {} for '{}' skipped: {}",
                            cycle_id,
                            self.config.service_name,
                            reason.as_str()
                        );
                        self.metrics.record_skip(reason);
                    }
                }
                log::info!("{}", self.metrics.summary());

                Ok(CycleReport {
                    cycle_id,
                    states: self.trail.clone(),
                    outcome,
                    log_count,
                    duration,
                })
            }
            Err(e) => {
                self.advance(CycleEvent::Failed);
                self.metrics.record_failure();
                log::error!(
                    "Cycle {} failed for service '{}' (window {}m, collaborator {}): {}",
                    cycle_id,
                    self.config.service_name,
                    self.config.window_minutes,
                    e.collaborator().map(|c| c.as_str()).unwrap_or("none"),
                    e
                );
                Err(e)
            }
        }
    }

    async fn cycle_body(&mut self) -> Result<(CycleOutcome, usize)> {
        let service = self.config.service_name.clone();
        let window = self.config.window_minutes;

        let batch: LogBatch = bounded(
            Collaborator::LogSource,
            self.config.log_fetch_timeout,
            self.log_source.fetch_error_logs(&service, window),
        )
        .await?;

        if batch.is_empty() {
            log::debug!("No error logs for '{}' in the last {}m", service, window);
            self.advance(CycleEvent::LogsEmpty);
            return Ok((CycleOutcome::NoLogs, 0));
        }
        self.advance(CycleEvent::LogsFetched);
        log::info!(
            "Fetched {} error logs for '{}' from {}",
            batch.len(),
            service,
            self.log_source.name()
        );

        let metrics = if self.config.include_metrics {
            match bounded(
                Collaborator::LogSource,
                self.config.log_fetch_timeout,
                self.log_source.fetch_metrics(&service),
            )
            .await
            {
                Ok(metrics) => metrics,
                Err(e) => {
                    log::warn!("Metrics unavailable for '{}': {}", service, e);
                    None
                }
            }
        } else {
            None
        };

        let logs_text = format_logs_for_analysis(&batch, ANALYSIS_LOG_LIMIT);
        let metrics_text = metrics.as_ref().map(|m| format_metrics(Some(m)));

        let analyzed = bounded(
            Collaborator::Analysis,
            self.config.analysis_timeout,
            self.analysis.analyze(&logs_text, metrics_text.as_deref()),
        )
        .await;

        let verdict = match analyzed {
            Ok(verdict) => verdict,
            Err(TripwireError::MalformedVerdict(msg)) => {
                log::warn!(
                    "Unusable verdict from {} for '{}', treating as not actionable: {}",
                    self.analysis.name(),
                    service,
                    msg
                );
                self.advance(CycleEvent::VerdictMalformed);
                self.advance(CycleEvent::Finished);
                return Ok((
                    CycleOutcome::Skipped(SkipReason::MalformedVerdict(msg)),
                    batch.len(),
                ));
            }
            Err(e) => return Err(e),
        };
        self.advance(CycleEvent::VerdictReady);

        match self.decision.decide(&verdict).await {
            Decision::Skip(reason) => {
                self.advance(CycleEvent::Skip);
                self.advance(CycleEvent::Finished);
                Ok((CycleOutcome::Skipped(reason), batch.len()))
            }
            Decision::Create => {
                self.advance(CycleEvent::Create);
                let outcome = self.decision.create(&verdict, &batch).await?;
                self.advance(CycleEvent::Finished);
                let outcome = match outcome {
                    DecisionOutcome::Created(ticket) => CycleOutcome::Created(ticket),
                    DecisionOutcome::Skipped(reason) => CycleOutcome::Skipped(reason),
                };
                Ok((outcome, batch.len()))
            }
        }
    }

    /// Poll until `shutdown` turns true. A stop request interrupts the sleep
    /// between cycles but never a cycle in flight.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PollerMetrics {
        log::info!(
            "Poller started for '{}' (interval {}s, window {}m)",
            self.config.service_name,
            self.config.interval.as_secs(),
            self.config.window_minutes
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.run_cycle().await {
                Ok(_) => self.config.interval,
                Err(_) => self.config.recovery_delay,
            };

            if wait_or_stop(delay, &mut shutdown).await {
                break;
            }
        }

        log::info!("Poller stopped for '{}'", self.config.service_name);
        self.metrics
    }
}

/// Sleep for `delay`; returns true if a stop was requested meanwhile.
async fn wait_or_stop(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}
