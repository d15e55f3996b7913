//! Embedding similarity against the curated questions.
//!
//! The index is built once from the knowledge base and keeps its own copy of
//! the key order, so vector `i` always belongs to `keys[i]`.

use anyhow::{anyhow, Result};
use rayon::prelude::*;
use std::sync::Arc;

use crate::embeddings::{cosine_similarity, EmbeddingModel};
use crate::knowledge::KnowledgeBase;
use crate::text::normalize;

pub struct SemanticIndex {
    model: Arc<dyn EmbeddingModel>,
    keys: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl SemanticIndex {
    pub fn build(knowledge: &KnowledgeBase, model: Arc<dyn EmbeddingModel>) -> Result<Self> {
        let keys: Vec<String> = knowledge.keys().map(str::to_string).collect();
        let texts: Vec<&str> = keys.iter().map(String::as_str).collect();

        let started = std::time::Instant::now();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            model.embed_documents(&texts)?
        };
        if vectors.len() != keys.len() {
            return Err(anyhow!(
                "Embedding model returned {} vectors for {} questions",
                vectors.len(),
                keys.len()
            ));
        }

        tracing::info!(
            questions = keys.len(),
            dimension = model.dimension(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built semantic index"
        );

        Ok(Self {
            model,
            keys,
            vectors,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Cosine similarity of `normalized_question` against every indexed vector.
    pub fn similarities(&self, normalized_question: &str) -> Result<Vec<f32>> {
        let query = self.model.embed_query(normalized_question)?;
        Ok(self
            .vectors
            .par_iter()
            .map(|v| cosine_similarity(&query, v))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticHit {
    pub key: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct SemanticMatcher {
    pub threshold: f32,
}

impl Default for SemanticMatcher {
    fn default() -> Self {
        Self { threshold: 0.6 }
    }
}

impl SemanticMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Knowledge-base key most similar to `question`, if strictly above the threshold.
    ///
    /// Encoding failures are logged and treated as no match.
    pub fn find(&self, question: &str, index: &SemanticIndex) -> Option<SemanticHit> {
        if index.is_empty() {
            return None;
        }

        let scores = match index.similarities(&normalize(question)) {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(error = %e, "Semantic encoding failed, skipping stage");
                return None;
            }
        };

        let (idx, similarity) = best_above(&scores, self.threshold)?;
        Some(SemanticHit {
            key: index.keys[idx].clone(),
            similarity,
        })
    }
}

/// First maximum of `scores`, kept only if strictly greater than `threshold`.
pub fn best_above(scores: &[f32], threshold: f32) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((idx, score));
        }
    }
    best.filter(|&(_, score)| score > threshold)
}


#[cfg(test)]
mod tests {
    use super::test_support::{FailingEmbedding, TableEmbedding};
    use super::*;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_pairs([
            ("Học phí bao nhiêu?", "15 triệu"),
            ("Trường ở đâu?", "Hải Phòng"),
        ])
    }

    fn model() -> Arc<dyn EmbeddingModel> {
        Arc::new(TableEmbedding::new(
            &[
                ("hoc phi bao nhieu", vec![1.0, 0.0, 0.0]),
                ("truong o dau", vec![0.0, 1.0, 0.0]),
                ("chi phi hoc tap", vec![0.9, 0.1, 0.0]),
            ],
            vec![0.0, 0.0, 1.0],
        ))
    }

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(best_above(&[0.6], 0.6), None);
        assert_eq!(best_above(&[0.60001], 0.6), Some((0, 0.60001)));
        assert_eq!(best_above(&[0.2, 0.7, 0.7], 0.6), Some((1, 0.7)));
        assert_eq!(best_above(&[], 0.6), None);
        assert_eq!(best_above(&[f32::NAN, 0.9], 0.6), Some((1, 0.9)));
    }

    #[test]
    fn test_index_aligned_with_knowledge_order() {
        let index = SemanticIndex::build(&kb(), model()).unwrap();
        assert_eq!(index.keys(), &["hoc phi bao nhieu".to_string(), "truong o dau".to_string()]);
    }

    #[test]
    fn test_paraphrase_matches() {
        let index = SemanticIndex::build(&kb(), model()).unwrap();
        let hit = SemanticMatcher::default().find("Chi phí học tập?", &index).unwrap();
        assert_eq!(hit.key, "hoc phi bao nhieu");
        assert!(hit.similarity > 0.9);
    }

    #[test]
    fn test_unrelated_question_misses() {
        let index = SemanticIndex::build(&kb(), model()).unwrap();
        assert!(SemanticMatcher::default().find("thời tiết", &index).is_none());
    }

    #[test]
    fn test_encoding_failure_is_no_match() {
        let index = SemanticIndex {
            model: Arc::new(FailingEmbedding),
            keys: vec!["hoc phi".to_string()],
            vectors: vec![vec![1.0, 0.0]],
        };
        assert!(SemanticMatcher::default().find("hoc phi", &index).is_none());
    }

    #[test]
    fn test_build_propagates_model_failure() {
        assert!(SemanticIndex::build(&kb(), Arc::new(FailingEmbedding)).is_err());
    }

    #[test]
    fn test_empty_knowledge_builds_empty_index() {
        let index = SemanticIndex::build(&KnowledgeBase::default(), model()).unwrap();
        assert!(index.is_empty());
        assert!(SemanticMatcher::default().find("anything", &index).is_none());
    }
}
