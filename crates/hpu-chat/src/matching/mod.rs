//! Match strategies tried by the resolver, in priority order:
//! lexical (curated questions), semantic (embedding index), history.

pub mod fuzzy;
pub mod history;
pub mod lexical;
pub mod semantic;

pub use history::HistoryMatcher;
pub use lexical::LexicalMatcher;
pub use semantic::{SemanticIndex, SemanticMatcher};

use serde::{Deserialize, Serialize};

/// Scores how similar a candidate is to a query, on a 0–100 scale.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, query: &str, choice: &str) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scorer {
    /// Weighted combination of ratio, partial and token scorers.
    #[default]
    WRatio,
    /// Plain normalized Indel similarity.
    Ratio,
}

impl SimilarityScorer for Scorer {
    fn score(&self, query: &str, choice: &str) -> f64 {
        match self {
            Scorer::WRatio => fuzzy::wratio(query, choice),
            Scorer::Ratio => fuzzy::ratio(query, choice),
        }
    }
}

/// Best-scoring choice, if its score reaches `cutoff` (inclusive).
///
/// Ties resolve to the earliest choice. Returns `(index, score)`.
pub fn extract_one<'a, I>(
    query: &str,
    choices: I,
    scorer: &dyn SimilarityScorer,
    cutoff: f64,
) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, choice) in choices.into_iter().enumerate() {
        let score = scorer.score(query, choice);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((idx, score));
        }
    }
    best.filter(|&(_, score)| score >= cutoff)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::SimilarityScorer;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed scores per choice and counts how often it was asked.
    #[derive(Default)]
    pub struct FixedScorer {
        pub scores: HashMap<String, f64>,
        pub calls: AtomicUsize,
    }

    impl FixedScorer {
        pub fn new(scores: &[(&str, f64)]) -> Self {
            Self {
                scores: scores
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SimilarityScorer for FixedScorer {
        fn score(&self, _query: &str, choice: &str) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.scores.get(choice).copied().unwrap_or(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FixedScorer;
    use super::*;

    #[test]
    fn test_extract_one_cutoff_is_inclusive() {
        let scorer = FixedScorer::new(&[("a", 80.0), ("b", 79.9)]);
        assert_eq!(extract_one("q", ["b", "a"], &scorer, 80.0), Some((1, 80.0)));
        assert_eq!(extract_one("q", ["b"], &scorer, 80.0), None);
    }

    #[test]
    fn test_extract_one_first_max_wins() {
        let scorer = FixedScorer::new(&[("x", 90.0), ("y", 90.0), ("z", 10.0)]);
        assert_eq!(extract_one("q", ["z", "x", "y"], &scorer, 50.0), Some((1, 90.0)));
    }

    #[test]
    fn test_extract_one_empty_choices() {
        let scorer = FixedScorer::default();
        assert_eq!(extract_one("q", std::iter::empty::<&str>(), &scorer, 0.0), None);
        assert_eq!(scorer.calls(), 0);
    }

    #[test]
    fn test_scorer_variants() {
        assert_eq!(Scorer::Ratio.score("abc", "abc"), 100.0);
        assert_eq!(Scorer::WRatio.score("", "abc"), 0.0);
        assert_eq!(Scorer::default(), Scorer::WRatio);
    }
}
