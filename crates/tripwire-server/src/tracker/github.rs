//! Minimal GitHub REST client for the issue operations the tracker exposes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tripwire_core::{CreatedTicket, ExistingTicket, TicketSummary};

/// Labels applied when a creation request names none.
pub const DEFAULT_LABELS: &[&str] = &["ai-detected", "bug"];

const DUPLICATE_SCAN_PAGE: u32 = 100;
const LIST_PAGE: u32 = 50;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub returned {status}: {message}")]
    Api { status: u16, message: String },
}

pub type GitHubResult<T> = std::result::Result<T, GitHubError>;

#[derive(Debug, Deserialize)]
struct Issue {
    number: u64,
    id: u64,
    title: String,
    state: String,
    html_url: String,
    #[serde(default)]
    labels: Vec<Label>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Comment {
    id: u64,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

/// A posted comment.
#[derive(Debug, Clone, Serialize)]
pub struct CommentRef {
    pub id: u64,
    pub url: String,
}

/// Issue state after a close.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedIssue {
    pub number: u64,
    pub state: String,
}

/// Case-insensitive containment either way, as the tracker's own duplicate rule.
pub fn titles_overlap(existing: &str, candidate: &str) -> bool {
    let existing = existing.to_lowercase();
    let candidate = candidate.to_lowercase();
    existing.contains(&candidate) || candidate.contains(&existing)
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubClient {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> GitHubResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tripwire/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        })
    }

    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn issues_url(&self) -> String {
        format!("{}/repos/{}/{}/issues", self.api_url, self.owner, self.repo)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> GitHubResult<T> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ApiMessage>()
                .await
                .ok()
                .and_then(|m| m.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }

    async fn list_raw(&self, state: &str, labels: Option<&str>, per_page: u32) -> GitHubResult<Vec<Issue>> {
        let per_page = per_page.to_string();
        let mut query = vec![
            ("state", state),
            ("per_page", per_page.as_str()),
            ("sort", "created"),
            ("direction", "desc"),
        ];
        if let Some(labels) = labels {
            query.push(("labels", labels));
        }
        let url = self.issues_url();
        self.send(self.request(reqwest::Method::GET, &url).query(&query))
            .await
    }

    pub async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> GitHubResult<CreatedTicket> {
        log::info!("Creating GitHub issue '{}' with labels {:?}", title, labels);
        let url = self.issues_url();
        let issue: Issue = self
            .send(
                self.request(reqwest::Method::POST, &url)
                    .json(&json!({ "title": title, "body": body, "labels": labels })),
            )
            .await?;
        log::info!("GitHub issue created: #{} {}", issue.number, issue.html_url);

        Ok(CreatedTicket {
            number: issue.number,
            url: issue.html_url,
            id: issue.id,
            title: issue.title,
            state: issue.state,
            created_at: issue.created_at,
        })
    }

    /// First of the 100 newest open issues whose title overlaps `title`.
    pub async fn find_existing(&self, title: &str) -> GitHubResult<Option<ExistingTicket>> {
        let issues = self.list_raw("open", None, DUPLICATE_SCAN_PAGE).await?;
        let found = issues
            .into_iter()
            .find(|issue| titles_overlap(&issue.title, title))
            .map(|issue| ExistingTicket {
                number: issue.number,
                url: issue.html_url,
                title: issue.title,
            });

        match &found {
            Some(existing) => log::info!(
                "Found existing issue #{} '{}' for '{}'",
                existing.number,
                existing.title,
                title
            ),
            None => log::debug!("No existing issue overlaps '{}'", title),
        }
        Ok(found)
    }

    pub async fn add_comment(&self, number: u64, comment: &str) -> GitHubResult<CommentRef> {
        let url = format!("{}/{}/comments", self.issues_url(), number);
        let posted: Comment = self
            .send(self.request(reqwest::Method::POST, &url).json(&json!({ "body": comment })))
            .await?;
        log::info!("Comment {} added to #{}", posted.id, number);
        Ok(CommentRef {
            id: posted.id,
            url: posted.html_url,
        })
    }

    /// Close an issue, posting `comment` first when given.
    pub async fn close_issue(&self, number: u64, comment: Option<&str>) -> GitHubResult<ClosedIssue> {
        if let Some(comment) = comment {
            self.add_comment(number, comment).await?;
        }
        let url = format!("{}/{}", self.issues_url(), number);
        let issue: Issue = self
            .send(self.request(reqwest::Method::PATCH, &url).json(&json!({ "state": "closed" })))
            .await?;
        log::info!("Issue #{} closed", number);
        Ok(ClosedIssue {
            number: issue.number,
            state: issue.state,
        })
    }

    pub async fn list_issues(&self, state: &str, labels: Option<&str>) -> GitHubResult<Vec<TicketSummary>> {
        let issues = self.list_raw(state, labels, LIST_PAGE).await?;
        Ok(issues
            .into_iter()
            .map(|issue| TicketSummary {
                number: issue.number,
                title: issue.title,
                state: issue.state,
                labels: issue.labels.into_iter().map(|l| l.name).collect(),
                url: Some(issue.html_url),
                created_at: Some(issue.created_at),
                updated_at: Some(issue.updated_at),
            })
            .collect())
    }
}
