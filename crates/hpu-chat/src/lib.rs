//! Question answering for the HPU student chatbot.
//!
//! A question is resolved by the first strategy that produces an answer:
//! fuzzy match against the curated knowledge base, embedding similarity
//! against the same questions, fuzzy match against earlier conversation,
//! and finally a remote generative model. Every answer is appended to the
//! conversation history.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod history;
pub mod knowledge;
pub mod llm;
pub mod matching;
pub mod persona;
pub mod resolver;
pub mod text;

pub use config::ChatConfig;
pub use error::{ParseError, PersistenceError, RemoteServiceError, ResolveError};
pub use history::{HistoryStore, InMemoryHistoryStore, JsonHistoryStore, QaEntry};
pub use knowledge::{KnowledgeBase, KnowledgeSource};
pub use llm::{GeminiBackend, GenerativeBackend, UnconfiguredBackend};
pub use matching::{Scorer, SemanticIndex};
pub use resolver::{AnswerResolver, MatchSource, PipelineContext, Resolution};
pub use text::normalize;
