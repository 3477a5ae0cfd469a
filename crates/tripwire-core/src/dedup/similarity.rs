use std::collections::HashSet;

/// Bracketed severity tags the tracker titles carry, e.g. `[CRITICAL] ...`.
const SEVERITY_TAGS: [&str; 4] = ["[critical]", "[high]", "[medium]", "[low]"];

/// Shorthand folded to one spelling so that `db pool` and `database pool`
/// count as the same words. Any other abbreviation stays a distinct word.
const ABBREVIATIONS: &[(&str, &str)] = &[("db", "database")];

/// Normalize a ticket title for comparison.
///
/// Lower-cases, drops bracketed severity tags, strips punctuation, expands
/// `db` to `database` and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
    let mut lowered = title.to_lowercase();
    for tag in SEVERITY_TAGS {
        lowered = lowered.replace(tag, " ");
    }

    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    stripped
        .split_whitespace()
        .map(expand_abbreviation)
        .collect::<Vec<_>>()
        .join(" ")
}

fn expand_abbreviation(word: &str) -> &str {
    ABBREVIATIONS
        .iter()
        .find(|(short, _)| *short == word)
        .map(|(_, long)| *long)
        .unwrap_or(word)
}

/// Word-level Jaccard similarity of two normalized titles, in `[0, 1]`.
///
/// Words are compared as sets. Two empty titles score 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();

    intersection as f64 / union as f64
}

/// Normalize both titles, then score them.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    similarity(&normalize_title(a), &normalize_title(b))
}
