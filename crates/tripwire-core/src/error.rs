use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TripwireError>;

/// Which external collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    LogSource,
    Analysis,
    Tracker,
}

impl Collaborator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collaborator::LogSource => "log_source",
            Collaborator::Analysis => "analysis",
            Collaborator::Tracker => "tracker",
        }
    }
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TripwireError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Log source error: {0}")]
    LogSource(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Malformed verdict: {0}")]
    MalformedVerdict(String),

    #[error("Tracker error: {0}")]
    Tracker(String),

    #[error("{collaborator} call timed out after {after:?}")]
    Timeout {
        collaborator: Collaborator,
        after: Duration,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl TripwireError {
    /// Only configuration problems stop the process. Everything else is
    /// contained by the polling cycle that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TripwireError::Config(_))
    }

    /// The collaborator responsible for this error, if any.
    pub fn collaborator(&self) -> Option<Collaborator> {
        match self {
            TripwireError::LogSource(_) => Some(Collaborator::LogSource),
            TripwireError::Analysis(_) | TripwireError::MalformedVerdict(_) => {
                Some(Collaborator::Analysis)
            }
            TripwireError::Tracker(_) => Some(Collaborator::Tracker),
            TripwireError::Timeout { collaborator, .. } => Some(*collaborator),
            _ => None,
        }
    }
}
