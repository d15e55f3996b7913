use super::{extract_one, SimilarityScorer};
use crate::history::QaEntry;
use crate::text::normalize;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryHit<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub score: f64,
}

/// Fuzzy match against questions already asked in earlier turns.
///
/// The incoming question is normalized and compared with each entry's stored
/// key, which was normalized when the entry was recorded.
#[derive(Debug, Clone, Copy)]
pub struct HistoryMatcher {
    pub cutoff: f64,
}

impl Default for HistoryMatcher {
    fn default() -> Self {
        Self { cutoff: 85.0 }
    }
}

impl HistoryMatcher {
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }

    pub fn find<'a>(
        &self,
        question: &str,
        history: &'a [QaEntry],
        scorer: &dyn SimilarityScorer,
    ) -> Option<HistoryHit<'a>> {
        if history.is_empty() {
            return None;
        }

        let query = normalize(question);
        let keys = history.iter().map(|e| e.key.as_str());
        let (pos, score) = extract_one(&query, keys, scorer, self.cutoff)?;
        let matched = history[pos].key.as_str();

        // Earliest entry with that exact key
        let entry = history.iter().find(|e| e.key == matched)?;
        Some(HistoryHit {
            question: &entry.question,
            answer: &entry.answer,
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::test_support::FixedScorer;
    use crate::matching::Scorer;

    #[test]
    fn test_empty_history_scores_nothing() {
        let scorer = FixedScorer::default();
        assert!(HistoryMatcher::default().find("anything", &[], &scorer).is_none());
        assert_eq!(scorer.calls(), 0);
    }

    #[test]
    fn test_repeat_question_returns_earliest_answer() {
        let history = vec![
            QaEntry::new("hoc bong", "first answer"),
            QaEntry::new("diem chuan", "other"),
            QaEntry::new("hoc bong", "second answer"),
        ];
        let hit = HistoryMatcher::default()
            .find("Học bổng?", &history, &Scorer::WRatio)
            .unwrap();
        assert_eq!(hit.answer, "first answer");
        assert_eq!(hit.score, 100.0);
    }

    #[test]
    fn test_cutoff_boundary_is_inclusive() {
        let history = vec![QaEntry::new("stored", "answer")];
        let hit = HistoryMatcher::default()
            .find("q", &history, &FixedScorer::new(&[("stored", 85.0)]));
        assert_eq!(hit.map(|h| h.answer), Some("answer"));

        let miss = HistoryMatcher::default()
            .find("q", &history, &FixedScorer::new(&[("stored", 84.9)]));
        assert!(miss.is_none());
    }

    #[test]
    fn test_verbatim_vietnamese_repeat_matches() {
        let history = vec![QaEntry::new("Thư viện mở cửa lúc mấy giờ?", "7h30 đến 17h")];
        let hit = HistoryMatcher::default()
            .find("Thư viện mở cửa lúc mấy giờ?", &history, &Scorer::WRatio)
            .unwrap();
        assert_eq!(hit.answer, "7h30 đến 17h");
        assert_eq!(hit.question, "Thư viện mở cửa lúc mấy giờ?");
        assert_eq!(hit.score, 100.0);
    }

    #[test]
    fn test_spelling_variants_share_the_earliest_answer() {
        let history = vec![
            QaEntry::new("HỌC BỔNG???", "first"),
            QaEntry::new("học bổng", "second"),
        ];
        let hit = HistoryMatcher::default()
            .find("Học bổng", &history, &Scorer::WRatio)
            .unwrap();
        assert_eq!(hit.answer, "first");
    }

    #[test]
    fn test_stored_key_is_not_recomputed() {
        let mut entry = QaEntry::new("HỌC BỔNG???", "answer");
        entry.key = "ky tuc xa".to_string();
        let history = vec![entry];
        assert!(HistoryMatcher::new(100.0)
            .find("hoc bong", &history, &Scorer::Ratio)
            .is_none());
        assert!(HistoryMatcher::new(100.0)
            .find("Ký túc xá", &history, &Scorer::Ratio)
            .is_some());
    }
}
