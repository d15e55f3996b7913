//! Curated question/answer set, keyed by normalized question.

pub mod loader;

pub use loader::{load, KnowledgeSource};

use std::collections::HashMap;

use crate::text::normalize;

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeEntry {
    /// Normalized question, the lookup key.
    pub key: String,
    pub answer: String,
}

/// Immutable after construction. Iteration order is the order in which keys
/// first appeared in the source.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    index: HashMap<String, usize>,
}

impl KnowledgeBase {
    /// Build from raw (question, answer) pairs.
    ///
    /// A question whose normalized form was already seen replaces the earlier
    /// answer but keeps the earlier position.
    pub fn from_pairs<I, Q, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Q, A)>,
        Q: Into<String>,
        A: Into<String>,
    {
        let mut kb = Self::default();
        for (question, answer) in pairs {
            let key = normalize(&question.into());
            let entry = KnowledgeEntry {
                key: key.clone(),
                answer: answer.into(),
            };
            match kb.index.get(&key) {
                Some(&pos) => kb.entries[pos] = entry,
                None => {
                    kb.index.insert(key, kb.entries.len());
                    kb.entries.push(entry);
                }
            }
        }
        kb
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Answer for an already-normalized key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .map(|&pos| self.entries[pos].answer.as_str())
    }

    pub fn entry(&self, pos: usize) -> Option<&KnowledgeEntry> {
        self.entries.get(pos)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_normalized() {
        let kb = KnowledgeBase::from_pairs([("Giới thiệu về trường?", "HPU thanh lap 2019")]);
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.get("gioi thieu ve truong"), Some("HPU thanh lap 2019"));
        assert_eq!(kb.entry(0).map(|e| e.key.as_str()), Some("gioi thieu ve truong"));
    }

    #[test]
    fn test_duplicate_keeps_first_position_last_value() {
        let kb = KnowledgeBase::from_pairs([
            ("Học phí?", "old"),
            ("Điểm chuẩn", "score"),
            ("học phí", "new"),
        ]);
        assert_eq!(kb.len(), 2);
        let keys: Vec<&str> = kb.keys().collect();
        assert_eq!(keys, vec!["hoc phi", "diem chuan"]);
        assert_eq!(kb.get("hoc phi"), Some("new"));
    }

    #[test]
    fn test_empty() {
        let kb = KnowledgeBase::default();
        assert!(kb.is_empty());
        assert_eq!(kb.get("anything"), None);
        assert!(kb.entry(0).is_none());
    }
}
