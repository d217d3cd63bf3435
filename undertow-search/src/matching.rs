//! Title similarity and candidate selection for identity resolution.

use undertow_core::CatalogEntry;
use undertow_core::config::{MatchPolicy, MatchingConfig};

use crate::types::SearchCandidate;

/// Similarity of two titles on a 0-100 scale.
///
/// `100 * (1 - distance / longest)`, where distance is the Levenshtein edit
/// distance over characters and longest is the longer title's character
/// count. Comparison is case-sensitive. Two empty titles score 100.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100.0;
    }

    let distance = strsim::levenshtein(a, b);
    100.0 * (longest - distance) as f64 / longest as f64
}

/// Checks year, season and media type against the catalog entry.
///
/// An entry without a year never passes. Season and type compare
/// case-insensitively; a value missing from the entry only matches an empty
/// value on the candidate.
pub fn passes_filters(entry: &CatalogEntry, candidate: &SearchCandidate) -> bool {
    let same = |expected: Option<&str>, actual: &str| {
        expected.unwrap_or_default().to_lowercase() == actual.to_lowercase()
    };

    entry.year == Some(candidate.year)
        && same(entry.season.as_deref(), &candidate.season)
        && same(entry.media_type.as_deref(), &candidate.media_type)
}

/// Best similarity between the candidate title and any catalog title.
pub fn best_title_score(entry: &CatalogEntry, candidate: &SearchCandidate) -> f64 {
    entry
        .titles
        .iter()
        .map(|title| title_similarity(&title.title, &candidate.title))
        .fold(0.0, f64::max)
}

/// A candidate that passed filtering, with its title score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate<'a> {
    pub candidate: &'a SearchCandidate,
    pub score: f64,
}

/// Picks the candidate the resolver should accept, if any.
///
/// Candidates failing the filters are never considered, whatever their
/// score. Under `FirstAboveThreshold` scanning stops at the first candidate
/// scoring at least `threshold`; under `BestAboveThreshold` the highest score
/// wins and ties keep the earlier candidate.
pub fn select_candidate<'a>(
    entry: &CatalogEntry,
    candidates: &'a [SearchCandidate],
    matching: &MatchingConfig,
) -> Option<ScoredCandidate<'a>> {
    let mut qualifying = candidates
        .iter()
        .filter(|candidate| passes_filters(entry, candidate))
        .map(|candidate| ScoredCandidate {
            candidate,
            score: best_title_score(entry, candidate),
        })
        .filter(|scored| scored.score >= matching.threshold);

    match matching.policy {
        MatchPolicy::FirstAboveThreshold => qualifying.next(),
        MatchPolicy::BestAboveThreshold => qualifying.fold(None, |best, scored| match best {
            Some(best) if best.score >= scored.score => Some(best),
            _ => Some(scored),
        }),
    }
}
