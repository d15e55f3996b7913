//! Conversation history: an ordered, append-only log of answered questions.

pub mod json_store;

pub use json_store::JsonHistoryStore;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::text::normalize;

/// One answered question. `question` is kept as the user typed it; `key` is
/// its normalized form, which is what later questions are matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredEntry")]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
    pub key: String,
}

impl QaEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            key: normalize(&question),
            question,
            answer: answer.into(),
        }
    }
}

/// On-disk shape. Logs written before keys were stored get one on load.
#[derive(Deserialize)]
struct StoredEntry {
    question: String,
    answer: String,
    #[serde(default)]
    key: Option<String>,
}

impl From<StoredEntry> for QaEntry {
    fn from(stored: StoredEntry) -> Self {
        let key = stored
            .key
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| normalize(&stored.question));
        Self {
            question: stored.question,
            answer: stored.answer,
            key,
        }
    }
}

/// Durable owner of the conversation log.
///
/// `load` never fails: unreadable storage degrades to an empty history.
/// `append` must either persist the entry or return an error.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Vec<QaEntry>;

    fn append(&self, question: &str, answer: &str) -> Result<(), PersistenceError>;
}

/// Process-local history, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<Vec<QaEntry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<QaEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn load(&self) -> Vec<QaEntry> {
        self.entries.read().clone()
    }

    fn append(&self, question: &str, answer: &str) -> Result<(), PersistenceError> {
        self.entries.write().push(QaEntry::new(question, answer));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_round_trip() {
        let store = InMemoryHistoryStore::with_entries(vec![QaEntry::new("a", "1")]);
        store.append("b", "2").unwrap();
        let history = store.load();
        assert_eq!(history, vec![QaEntry::new("a", "1"), QaEntry::new("b", "2")]);
    }

    #[test]
    fn test_entry_key_is_normalized_question() {
        let entry = QaEntry::new("Thư viện mở cửa lúc mấy giờ?", "7h30");
        assert_eq!(entry.question, "Thư viện mở cửa lúc mấy giờ?");
        assert_eq!(entry.key, "thu vien mo cua luc may gio");
    }

    #[test]
    fn test_legacy_entry_without_key_gets_one() {
        let entry: QaEntry =
            serde_json::from_str(r#"{"question": "Học phí?", "answer": "15 triệu"}"#).unwrap();
        assert_eq!(entry, QaEntry::new("Học phí?", "15 triệu"));

        let stored: QaEntry =
            serde_json::from_str(r#"{"question": "Học phí?", "answer": "x", "key": "custom"}"#)
                .unwrap();
        assert_eq!(stored.key, "custom");
    }
}
