//! Route similarity comparison.
//!
//! Routes are compared by the normalized edit distance between their textual
//! signatures (see [`Route::signature`]). This is a deliberate proxy for
//! geometric similarity: two routes over the same roads emit the same
//! instruction sequence, so a small edit distance means the path barely
//! changed. Consumers that need geometric precision can layer a
//! Hausdorff-style comparison on top; the orchestrator only needs a stable
//! "did the path materially change" signal.

use super::model::Route;
use std::borrow::Borrow;

/// Difference score above which two routes are considered distinct.
///
/// The score is `edit_distance / (len(a) + len(b))`, so replacing half of
/// one signature with unrelated text scores 0.25.
pub const DIFFERENCE_SCORE_CUTOFF: f64 = 0.25;

/// Levenshtein edit distance between two strings, by character.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single-row DP; previous row is rebuilt in place.
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut previous_diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous_diagonal + usize::from(ca != cb);
            previous_diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }
    row[b.len()]
}

/// Normalized difference score between two routes.
///
/// 0.0 means identical signatures; scores grow with the fraction of the
/// combined signature length that would have to change. Returns 0.0 when
/// both signatures are empty.
pub fn difference_score(a: &Route, b: &Route) -> f64 {
    let sig_a = a.signature();
    let sig_b = b.signature();
    let total = (sig_a.chars().count() + sig_b.chars().count()) as f64;
    if total == 0.0 {
        return 0.0;
    }
    edit_distance(&sig_a, &sig_b) as f64 / total
}

/// True when two routes are close enough to be treated as the same path.
pub fn routes_are_similar(a: &Route, b: &Route) -> bool {
    difference_score(a, b) < DIFFERENCE_SCORE_CUTOFF
}

/// Index of the candidate most similar to `target`.
///
/// Returns `None` only for an empty candidate list. When even the best
/// candidate differs by at least [`DIFFERENCE_SCORE_CUTOFF`], none of the
/// candidates resembles the target and the caller should fall back to its
/// own preference (typically the fastest candidate); that case is signalled
/// by the `is_similar` flag on the result.
pub fn most_similar_index<R: Borrow<Route>>(candidates: &[R], target: &Route) -> Option<MostSimilar> {
    let (index, score) = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| (index, difference_score(candidate.borrow(), target)))
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    Some(MostSimilar {
        index,
        score,
        is_similar: score < DIFFERENCE_SCORE_CUTOFF,
    })
}

/// Result of a most-similar candidate search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MostSimilar {
    /// Index into the candidate slice.
    pub index: usize,
    /// Difference score of that candidate against the target.
    pub score: f64,
    /// Whether the score falls under [`DIFFERENCE_SCORE_CUTOFF`].
    pub is_similar: bool,
}
