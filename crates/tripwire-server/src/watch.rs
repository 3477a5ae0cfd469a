//! `tripwire watch`: wire the collaborators into a poller and run it until signalled.

use crate::analysis::OpenAiEngine;
use crate::clickhouse::ClickHouseSource;
use crate::config::TripwireConfig;
use crate::signal::shutdown_signal;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tripwire_client::TrackerClient;
use tripwire_core::{ensure_tracker_healthy, DecisionEngine, Poller};

pub async fn run(config: TripwireConfig) -> Result<()> {
    config.validate_for_watch()?;

    info!("Starting tripwire watch v{}", env!("CARGO_PKG_VERSION"));
    info!("Service: {}", config.analyzer.service_name);
    info!(
        "Interval: {}s, window: {}m",
        config.analyzer.poll_interval_secs, config.analyzer.window_minutes
    );

    let log_source = ClickHouseSource::new(config.log_source.clone())?;
    info!("Log source: ClickHouse at {}", log_source.endpoint());

    let analysis = OpenAiEngine::new(config.analysis.clone())?;
    info!("Analysis model: {}", analysis.model());

    let tracker = Arc::new(TrackerClient::new(&config.tracker.url)?);
    ensure_tracker_healthy(tracker.as_ref(), &config.timeouts())
        .await
        .with_context(|| format!("tracker at {} is not usable", config.tracker.url))?;
    info!("Tracker healthy at {}", config.tracker.url);

    let decision = DecisionEngine::new(tracker, config.decision_config());
    let poller = Poller::new(
        Arc::new(log_source),
        Arc::new(analysis),
        decision,
        config.poller_config(),
    )?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let metrics = poller.run(stop_rx).await;
    info!("Final: {}", metrics.summary());
    Ok(())
}
