//! Text canonicalization shared by every matching strategy.

use unicode_normalization::UnicodeNormalization;

/// Canonical comparison form of a question.
///
/// Lowercases, decomposes to NFD and keeps only alphanumerics and whitespace,
/// which strips punctuation together with combining diacritics. `đ` has no
/// decomposition and is folded to `d` explicitly.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .map(|c| if c == 'đ' { 'd' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vietnamese_question() {
        assert_eq!(normalize("Giới thiệu về trường?"), "gioi thieu ve truong");
        assert_eq!(normalize("Đại học Quản lý"), "dai hoc quan ly");
    }

    #[test]
    fn test_strips_punctuation_keeps_spacing() {
        assert_eq!(normalize("Hello, World!!"), "hello world");
        assert_eq!(normalize("a  -  b"), "a    b");
        assert_eq!(normalize("HPU_2019?"), "hpu2019");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Giới thiệu về trường?",
            "Học phí ngành CNTT là bao nhiêu???",
            "İstanbul ǅemal ﬁle",
            "",
            "   ",
            "汉语 课程？",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_empty_and_symbols_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!.,;"), "");
    }
}
