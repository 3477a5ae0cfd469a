use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a polling cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Fetching,
    Analyzing,
    Deciding,
    Creating,
    Skipping,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleState::Idle => "idle",
            CycleState::Fetching => "fetching",
            CycleState::Analyzing => "analyzing",
            CycleState::Deciding => "deciding",
            CycleState::Creating => "creating",
            CycleState::Skipping => "skipping",
        };
        f.write_str(s)
    }
}

/// Inputs that move a cycle between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// The interval elapsed; start a cycle.
    Tick,
    /// The log source returned no entries.
    LogsEmpty,
    LogsFetched,
    VerdictReady,
    /// The engine's reply was unusable; treated as nothing actionable.
    VerdictMalformed,
    Create,
    Skip,
    Finished,
    /// Any collaborator failure or timeout.
    Failed,
}

/// Transition table for a single cycle.
///
/// `Failed` from any active state returns to `Idle`. Returns `None` for
/// combinations the loop never produces.
pub fn transition(state: CycleState, event: CycleEvent) -> Option<CycleState> {
    use CycleEvent as E;
    use CycleState as S;

    match (state, event) {
        (S::Idle, E::Tick) => Some(S::Fetching),

        (S::Fetching, E::LogsEmpty) => Some(S::Idle),
        (S::Fetching, E::LogsFetched) => Some(S::Analyzing),

        (S::Analyzing, E::VerdictReady) => Some(S::Deciding),
        (S::Analyzing, E::VerdictMalformed) => Some(S::Skipping),

        (S::Deciding, E::Create) => Some(S::Creating),
        (S::Deciding, E::Skip) => Some(S::Skipping),

        (S::Creating, E::Finished) => Some(S::Idle),
        (S::Skipping, E::Finished) => Some(S::Idle),

        (S::Idle, E::Failed) => None,
        (_, E::Failed) => Some(S::Idle),

        _ => None,
    }
}
