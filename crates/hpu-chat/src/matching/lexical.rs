use super::{extract_one, SimilarityScorer};
use crate::knowledge::KnowledgeBase;
use crate::text::normalize;

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit<'a> {
    pub key: &'a str,
    pub answer: &'a str,
    pub score: f64,
}

/// Fuzzy match of the question against every curated key.
#[derive(Debug, Clone, Copy)]
pub struct LexicalMatcher {
    pub cutoff: f64,
}

impl Default for LexicalMatcher {
    fn default() -> Self {
        Self { cutoff: 80.0 }
    }
}

impl LexicalMatcher {
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }

    pub fn find<'a>(
        &self,
        question: &str,
        knowledge: &'a KnowledgeBase,
        scorer: &dyn SimilarityScorer,
    ) -> Option<LexicalHit<'a>> {
        let query = normalize(question);
        let (pos, score) = extract_one(&query, knowledge.keys(), scorer, self.cutoff)?;
        let entry = knowledge.entry(pos)?;
        Some(LexicalHit {
            key: &entry.key,
            answer: &entry.answer,
            score,
        })
    }
}
