use crate::error::{AtelierError, Result};

// ---------------------------------------------------------------------------
// ScoreRule
// ---------------------------------------------------------------------------

/// A fn-pointer scoring rule: zero-cost, no heap allocation.
///
/// A rule contributes `weight` to every candidate accepted by `applies_to`
/// whenever `when` holds on the requirements. Rules with no matching
/// candidates or a false predicate contribute nothing.
pub struct ScoreRule<R, C> {
    pub id: &'static str,
    pub when: fn(&R) -> bool,
    pub applies_to: fn(&C) -> bool,
    pub weight: u32,
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Selection<'c, C> {
    pub index: usize,
    pub candidate: &'c C,
    pub score: u32,
    /// Score of every candidate, in input order. Useful for logging and for
    /// callers that want the full ranking.
    pub scores: Vec<u32>,
}

// ---------------------------------------------------------------------------
// select
// ---------------------------------------------------------------------------

/// Weighted-criteria selection over a candidate list.
///
/// Pure function of its inputs: for each candidate, sums the weights of every
/// rule whose predicate holds on `requirements` and whose filter accepts the
/// candidate. The *first* candidate (input order) reaching the maximum score
/// wins; downstream stages are specialized per selected candidate and rely on
/// this being reproducible for identical inputs.
///
/// There is no minimum-score floor: if every score is zero the first
/// candidate still wins. Callers needing a floor must filter beforehand.
///
/// Fails with `NoCandidatesAvailable` on an empty candidate list.
pub fn select<'c, R, C>(
    requirements: &R,
    candidates: &'c [C],
    rules: &[ScoreRule<R, C>],
) -> Result<Selection<'c, C>> {
    if candidates.is_empty() {
        return Err(AtelierError::NoCandidatesAvailable);
    }

    let active: Vec<&ScoreRule<R, C>> =
        rules.iter().filter(|r| (r.when)(requirements)).collect();

    let scores: Vec<u32> = candidates
        .iter()
        .map(|c| {
            active
                .iter()
                .filter(|r| (r.applies_to)(c))
                .map(|r| r.weight)
                .sum()
        })
        .collect();

    let mut best = 0usize;
    for (i, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = i;
        }
    }

    tracing::debug!(
        winner = best,
        score = scores[best],
        active_rules = active.len(),
        "selection complete"
    );

    Ok(Selection {
        index: best,
        candidate: &candidates[best],
        score: scores[best],
        scores,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
