use std::collections::BTreeMap;

use itertools::Itertools;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::metrics;
use crate::models::Problem;

pub const MAX_SUGGESTIONS: usize = 5;
pub const MOCK_INTERVIEW_SIZE: usize = 3;
pub const MOCK_INTERVIEW_MINUTES: i64 = 45;

#[derive(Debug, Clone, Copy)]
pub struct Suggestion<'a> {
    pub problem: &'a Problem,
    pub score: f64,
}

/// Weakness score of a problem: one point per tag, minus the tag's solve ratio.
pub fn weakness(problem: &Problem, ratios: &BTreeMap<String, f64>) -> f64 {
    problem
        .tags
        .iter()
        .unique()
        .filter_map(|tag| ratios.get(tag))
        .map(|ratio| 1.0 - ratio)
        .sum()
}

/// Unsolved problems touching the weakest topics, best candidates first.
///
/// Ties keep their input order.
pub fn rank<'a>(problems: &'a [Problem], ratios: &BTreeMap<String, f64>) -> Vec<Suggestion<'a>> {
    let mut scored = problems
        .iter()
        .filter(|p| p.status.is_pending())
        .map(|problem| Suggestion { problem, score: weakness(problem, ratios) })
        .collect::<Vec<_>>();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(MAX_SUGGESTIONS);
    scored
}

/// Ranks `problems` against their own topic ratios.
pub fn suggest(problems: &[Problem]) -> Vec<Suggestion<'_>> {
    rank(problems, &metrics::topic_ratios(problems))
}

/// Random set of problems for a timed mock interview.
pub fn mock_interview<'a, R: Rng + ?Sized>(problems: &'a [Problem], rng: &mut R) -> Vec<&'a Problem> {
    problems.choose_multiple(rng, MOCK_INTERVIEW_SIZE).collect()
}
