//! Duplicate suppression
//!
//! Two layers keep a recurring problem from opening a ticket per cycle:
//! - `RecencySuppressor`: in-process memory of tickets created in the last two hours,
//!   keyed on raw severity and title
//! - `DuplicateChecker`: word-level similarity against the tracker's open labeled tickets,
//!   on normalized titles

mod checker;
mod similarity;
mod suppressor;

pub use checker::{
    DuplicateChecker, DuplicateCheckerConfig, SimilarMatch, DEFAULT_SIMILARITY_THRESHOLD,
    DEFAULT_TRACKER_LABEL,
};
pub use similarity::{normalize_title, similarity, title_similarity};
pub use suppressor::{RecencySuppressor, DEFAULT_SUPPRESSION_TTL};
