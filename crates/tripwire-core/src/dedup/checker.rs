use super::similarity::{normalize_title, similarity};
use crate::error::Collaborator;
use crate::sources::{bounded, IssueTracker};
use std::sync::Arc;
use std::time::Duration;

/// Label carried by every ticket this system opens.
pub const DEFAULT_TRACKER_LABEL: &str = "ai-detected";

/// Score a candidate must exceed to count as covered by an open ticket.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// An open ticket that already covers a candidate title.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    pub number: u64,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct DuplicateCheckerConfig {
    pub label: String,
    pub threshold: f64,
    pub read_timeout: Duration,
}

impl Default for DuplicateCheckerConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_TRACKER_LABEL.to_string(),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Compares a candidate title against the tracker's open, labeled tickets.
///
/// Fails open: a tracker error, a timeout, or an empty listing all report no match.
pub struct DuplicateChecker<T: IssueTracker> {
    tracker: Arc<T>,
    config: DuplicateCheckerConfig,
}

impl<T: IssueTracker> DuplicateChecker<T> {
    pub fn new(tracker: Arc<T>, config: DuplicateCheckerConfig) -> Self {
        Self { tracker, config }
    }

    pub fn config(&self) -> &DuplicateCheckerConfig {
        &self.config
    }

    /// First open ticket whose normalized title scores above the threshold.
    pub async fn find_similar(&self, title: &str) -> Option<SimilarMatch> {
        let listing = bounded(
            Collaborator::Tracker,
            self.config.read_timeout,
            self.tracker.list_open_tickets(&self.config.label),
        )
        .await;

        let tickets = match listing {
            Ok(tickets) => tickets,
            Err(e) => {
                log::error!(
                    "Error checking for similar tickets (label '{}'): {}",
                    self.config.label,
                    e
                );
                return None;
            }
        };

        let candidate = normalize_title(title);

        tickets.into_iter().find_map(|ticket| {
            let score = similarity(&candidate, &normalize_title(&ticket.title));
            if score > self.config.threshold {
                log::info!(
                    "Found similar ticket #{} '{}' for '{}' (similarity {:.2})",
                    ticket.number,
                    ticket.title,
                    title,
                    score
                );
                Some(SimilarMatch {
                    number: ticket.number,
                    title: ticket.title,
                    score,
                })
            } else {
                None
            }
        })
    }

    pub async fn has_similar(&self, title: &str) -> bool {
        self.find_similar(title).await.is_some()
    }
}
