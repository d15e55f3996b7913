//! Answer resolution: lexical, then semantic, then history, then the
//! generative fallback. Whatever answers is recorded before it is returned.

use serde::Serialize;
use std::sync::Arc;

use crate::config::ChatConfig;
use crate::error::ResolveError;
use crate::history::{HistoryStore, QaEntry};
use crate::knowledge::KnowledgeBase;
use crate::llm::GenerativeBackend;
use crate::matching::{HistoryMatcher, LexicalMatcher, SemanticIndex, SemanticMatcher, SimilarityScorer};

/// Read-only state built once at startup and shared by every strategy.
pub struct PipelineContext {
    pub knowledge: KnowledgeBase,
    /// Absent when the embedding model could not be loaded.
    pub semantic: Option<SemanticIndex>,
    pub scorer: Box<dyn SimilarityScorer>,
}

impl PipelineContext {
    pub fn new(
        knowledge: KnowledgeBase,
        semantic: Option<SemanticIndex>,
        scorer: Box<dyn SimilarityScorer>,
    ) -> Self {
        Self {
            knowledge,
            semantic,
            scorer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Lexical,
    Semantic,
    History,
    Generative,
    GenerativeError,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::Lexical => "lexical",
            MatchSource::Semantic => "semantic",
            MatchSource::History => "history",
            MatchSource::Generative => "generative",
            MatchSource::GenerativeError => "generative_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub answer: String,
    pub source: MatchSource,
    /// Knowledge-base key, or the history question as the user typed it.
    pub matched: Option<String>,
    /// Fuzzy score (0-100) or cosine similarity, depending on the source.
    pub score: Option<f64>,
}

pub struct AnswerResolver {
    context: PipelineContext,
    history: Arc<dyn HistoryStore>,
    generative: Arc<dyn GenerativeBackend>,
    lexical: LexicalMatcher,
    semantic: SemanticMatcher,
    history_matcher: HistoryMatcher,
    error_prefix: String,
}

impl AnswerResolver {
    pub fn new(
        context: PipelineContext,
        history: Arc<dyn HistoryStore>,
        generative: Arc<dyn GenerativeBackend>,
    ) -> Self {
        Self {
            context,
            history,
            generative,
            lexical: LexicalMatcher::default(),
            semantic: SemanticMatcher::default(),
            history_matcher: HistoryMatcher::default(),
            error_prefix: "Lỗi khi gọi Gemini API".to_string(),
        }
    }

    /// Apply matching cutoffs and the error prefix from configuration.
    pub fn with_config(mut self, config: &ChatConfig) -> Self {
        self.lexical = LexicalMatcher::new(config.matching.lexical_cutoff);
        self.semantic = SemanticMatcher::new(config.matching.semantic_threshold);
        self.history_matcher = HistoryMatcher::new(config.matching.history_cutoff);
        self.error_prefix = config.generative.error_prefix.clone();
        self
    }

    pub async fn resolve(&self, question: &str) -> Result<String, ResolveError> {
        Ok(self.resolve_detailed(question).await?.answer)
    }

    pub async fn resolve_detailed(&self, question: &str) -> Result<Resolution, ResolveError> {
        if question.trim().is_empty() {
            return Err(ResolveError::EmptyQuestion);
        }

        let history = self.history.load();
        let resolution = if self.context.knowledge.is_empty() {
            tracing::warn!("Knowledge base is empty, going straight to the generative fallback");
            self.ask_generative(question, &history).await
        } else {
            match self.match_locally(question, &history) {
                Some(resolution) => resolution,
                None => self.ask_generative(question, &history).await,
            }
        };

        if let Err(e) = self.history.append(question, &resolution.answer) {
            tracing::error!(error = %e, "Failed to record answer");
            return Err(e.into());
        }

        tracing::info!(
            strategy = resolution.source.as_str(),
            matched = resolution.matched.as_deref().unwrap_or(""),
            score = resolution.score.unwrap_or_default(),
            "Resolved question"
        );
        Ok(resolution)
    }

    pub fn get_history(&self) -> Vec<QaEntry> {
        self.history.load()
    }

    fn match_locally(&self, question: &str, history: &[QaEntry]) -> Option<Resolution> {
        let scorer = self.context.scorer.as_ref();

        if let Some(hit) = self.lexical.find(question, &self.context.knowledge, scorer) {
            return Some(Resolution {
                answer: hit.answer.to_string(),
                source: MatchSource::Lexical,
                matched: Some(hit.key.to_string()),
                score: Some(hit.score),
            });
        }

        if let Some(index) = &self.context.semantic {
            if let Some(hit) = self.semantic.find(question, index) {
                match self.context.knowledge.get(&hit.key) {
                    Some(answer) => {
                        return Some(Resolution {
                            answer: answer.to_string(),
                            source: MatchSource::Semantic,
                            matched: Some(hit.key),
                            score: Some(hit.similarity as f64),
                        })
                    }
                    None => tracing::warn!(key = %hit.key, "Semantic hit has no knowledge entry"),
                }
            }
        }

        self.history_matcher
            .find(question, history, scorer)
            .map(|hit| Resolution {
                answer: hit.answer.to_string(),
                source: MatchSource::History,
                matched: Some(hit.question.to_string()),
                score: Some(hit.score),
            })
    }

    async fn ask_generative(&self, question: &str, history: &[QaEntry]) -> Resolution {
        match self.generative.ask(question, history).await {
            Ok(answer) => Resolution {
                answer,
                source: MatchSource::Generative,
                matched: None,
                score: None,
            },
            Err(e) => {
                tracing::error!(backend = self.generative.name(), error = %e, "Generative fallback failed");
                Resolution {
                    answer: format!("{}: {}", self.error_prefix, e.user_message()),
                    source: MatchSource::GenerativeError,
                    matched: None,
                    score: None,
                }
            }
        }
    }
}
