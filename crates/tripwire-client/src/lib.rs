//! HTTP client for the tripwire tracker service.
//!
//! Thin wrapper over reqwest that speaks the tracker's JSON contract and
//! implements [`IssueTracker`] so the polling loop can drive it directly.
//!
//! # Example
//! ```rust,no_run
//! use tripwire_client::TrackerClient;
//! use tripwire_core::IssueTracker;
//!
//! #[tokio::main]
//! async fn main() -> tripwire_core::Result<()> {
//!     let client = TrackerClient::new("http://localhost:3001")?;
//!
//!     if client.health().await? {
//!         for ticket in client.list_open_tickets("ai-detected").await? {
//!             println!("#{} {}", ticket.number, ticket.title);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tripwire_core::{
    CreateOutcome, CreatedTicket, ExistingTicket, IssueTracker, NewTicket, Result, TicketSummary,
    TripwireError,
};

/// Fallback deadline for any single request. Callers usually impose tighter ones.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    #[serde(default)]
    duplicate: bool,
    issue: Option<CreatedTicket>,
    existing_issue: Option<ExistingTicket>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    issues: Vec<TicketSummary>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    success: bool,
}

/// Client for a running tracker service.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    http: reqwest::Client,
    base_url: String,
}

impl TrackerClient {
    /// `base_url` is the service root, e.g. `"http://localhost:3001"`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TripwireError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, base_url))
    }

    /// Reuse an existing reqwest client.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// List tickets in any state, optionally filtered by a comma-separated label list.
    pub async fn list_tickets(&self, state: &str, labels: Option<&str>) -> Result<Vec<TicketSummary>> {
        let url = self.url("/api/issues");
        let mut query = vec![("state", state)];
        if let Some(labels) = labels {
            query.push(("labels", labels));
        }

        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;
        let body: ListResponse = decode(ensure_success(resp).await?).await?;
        Ok(body.issues)
    }
}

fn request_failed(url: &str, e: reqwest::Error) -> TripwireError {
    if e.is_timeout() {
        TripwireError::Tracker(format!("request to {} timed out", url))
    } else {
        TripwireError::Tracker(format!("request to {} failed: {}", url, e))
    }
}

/// Turn a non-2xx reply into a tracker error carrying the service's message.
async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body: ErrorBody = resp.json().await.unwrap_or_default();
    let error = body.error.unwrap_or_else(|| "request failed".to_string());
    Err(TripwireError::Tracker(match body.message {
        Some(message) => format!("{} ({}): {}", error, status, message),
        None => format!("{} ({})", error, status),
    }))
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json()
        .await
        .map_err(|e| TripwireError::Tracker(format!("unexpected response body: {}", e)))
}

#[async_trait]
impl IssueTracker for TrackerClient {
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<CreateOutcome> {
        let url = self.url("/api/issues");
        let resp = self
            .http
            .post(&url)
            .json(ticket)
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;

        let body: CreateResponse = decode(ensure_success(resp).await?).await?;

        match (body.duplicate, body.existing_issue, body.issue) {
            (true, Some(existing), _) => Ok(CreateOutcome::Duplicate(existing)),
            (false, _, Some(issue)) => Ok(CreateOutcome::Created(issue)),
            _ => Err(TripwireError::Tracker(
                "create response carried neither an issue nor a duplicate".into(),
            )),
        }
    }

    async fn list_open_tickets(&self, label: &str) -> Result<Vec<TicketSummary>> {
        self.list_tickets("open", Some(label)).await
    }

    async fn add_comment(&self, number: u64, text: &str) -> Result<()> {
        let url = self.url(&format!("/api/issues/{}/comments", number));
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "comment": text }))
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn close_ticket(&self, number: u64, comment: Option<&str>) -> Result<()> {
        let url = self.url(&format!("/api/issues/{}/close", number));
        let body = match comment {
            Some(comment) => json!({ "comment": comment }),
            None => json!({}),
        };
        let resp = self
            .http
            .patch(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn health(&self) -> Result<bool> {
        let url = self.url("/health");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;

        if !resp.status().is_success() {
            log::warn!("Tracker health probe returned {}", resp.status());
            return Ok(false);
        }

        match resp.json::<HealthResponse>().await {
            Ok(body) => Ok(body.success),
            Err(e) => {
                log::warn!("Tracker health probe returned an unexpected body: {}", e);
                Ok(false)
            }
        }
    }
}
