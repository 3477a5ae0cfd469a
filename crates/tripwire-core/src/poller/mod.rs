//! The polling loop
//!
//! Each cycle fetches error logs, asks the analysis engine for a verdict,
//! runs the decision engine and, when warranted, opens a ticket. Collaborator
//! failures end the cycle and shorten the next sleep to the recovery delay.

mod config;
mod engine;
mod metrics;
mod state;

pub use config::PollerConfig;
pub use engine::{CycleOutcome, CycleReport, Poller};
pub use metrics::PollerMetrics;
pub use state::{transition, CycleEvent, CycleState};
