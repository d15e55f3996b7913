//! Generative fallback: a remote model answers what no local strategy could.

pub mod gemini;

pub use gemini::GeminiBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteServiceError;
use crate::history::QaEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Remote model that answers a question given the prior conversation.
///
/// Implementations return the trimmed answer text, or their configured
/// "no response" text when the service answered with nothing.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn ask(&self, question: &str, history: &[QaEntry]) -> Result<String, RemoteServiceError>;

    fn name(&self) -> &str;
}

/// Stands in when no backend could be built; every call fails with the reason.
pub struct UnconfiguredBackend {
    reason: String,
}

impl UnconfiguredBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for UnconfiguredBackend {
    async fn ask(&self, _question: &str, _history: &[QaEntry]) -> Result<String, RemoteServiceError> {
        Err(RemoteServiceError::NotConfigured(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// Alternating user/assistant turns, oldest first. Entries with a blank
/// question or answer are skipped.
pub fn history_to_turns(history: &[QaEntry]) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() * 2);
    for (idx, entry) in history.iter().enumerate() {
        if entry.question.trim().is_empty() || entry.answer.trim().is_empty() {
            tracing::warn!(entry = idx, "Skipping incomplete history entry for model context");
            continue;
        }
        turns.push(ChatTurn::user(entry.question.as_str()));
        turns.push(ChatTurn::assistant(entry.answer.as_str()));
    }
    turns
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Replays canned results and records what it was asked.
    pub struct ScriptedBackend {
        responses: Mutex<Vec<Result<String, RemoteServiceError>>>,
        pub calls: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedBackend {
        pub fn new(responses: Vec<Result<String, RemoteServiceError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn answering(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn ask(&self, question: &str, history: &[QaEntry]) -> Result<String, RemoteServiceError> {
            self.calls.lock().push((question.to_string(), history.len()));
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Ok("scripted default".to_string());
            }
            responses.remove(0)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
