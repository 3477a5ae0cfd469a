//! Tracker service: an HTTP facade over GitHub issues.

pub mod github;
pub mod metrics;
mod routes;

pub use github::GitHubClient;
pub use metrics::TrackerMetrics;
pub use routes::create_router;

use crate::config::TripwireConfig;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub const SERVICE_NAME: &str = "tripwire-tracker";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub github: Arc<GitHubClient>,
    pub metrics: Arc<TrackerMetrics>,
    pub start_time: Instant,
}

/// Error body shared by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Custom error type for HTTP handlers
pub struct AppError {
    status: StatusCode,
    error: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// A 400 with a fixed message.
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            source: None,
        }
    }

    /// A 500 naming what failed, with the cause as `message`.
    pub fn upstream(error: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.into(),
            source: Some(source.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                success: false,
                error: self.error,
                message: self.source.map(|e| e.to_string()),
            }),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Build the GitHub client from validated config.
pub fn github_client(config: &TripwireConfig) -> anyhow::Result<GitHubClient> {
    config.validate_for_tracker()?;
    let github = &config.github;
    Ok(GitHubClient::new(
        &github.api_url,
        github.token.clone().unwrap_or_default(),
        github.owner.clone().unwrap_or_default(),
        github.repo.clone().unwrap_or_default(),
    )?)
}

/// Serve the tracker until `shutdown` resolves.
pub async fn serve<F>(config: &TripwireConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let github = github_client(config)?;
    info!("GitHub client initialized for {}", github.repository());

    let state = AppState {
        github: Arc::new(github),
        metrics: Arc::new(TrackerMetrics::new()),
        start_time: Instant::now(),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Tracker service listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Tracker service stopped");
    Ok(())
}
