use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TokenizerJson {
    model: ModelConfig,
    #[serde(default)]
    added_tokens: Vec<AddedToken>,
}

#[derive(Debug, Deserialize)]
struct ModelConfig {
    #[serde(default)]
    unk_id: Option<u32>,
    vocab: Vec<(String, f32)>,
}

#[derive(Debug, Deserialize)]
struct AddedToken {
    id: u32,
    content: String,
}

/// Longest vocabulary piece considered during segmentation, in chars.
const MAX_PIECE_CHARS: usize = 32;

/// SentencePiece Unigram tokenizer for XLM-R style `tokenizer.json` files
pub struct SentencePieceTokenizer {
    vocab: HashMap<String, u32>,
    scores: HashMap<u32, f32>,
    bos_id: u32,
    eos_id: u32,
    pad_id: u32,
    unk_id: u32,
    cache: Mutex<lru::LruCache<String, Vec<u32>>>,
}

impl SentencePieceTokenizer {
    pub fn from_model_dir(model_dir: &Path) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer_json = std::fs::read_to_string(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to read {}: {}", tokenizer_path.display(), e))?;
        Self::from_json(&tokenizer_json)
    }

    pub fn from_json(tokenizer_json: &str) -> Result<Self> {
        let data: TokenizerJson = serde_json::from_str(tokenizer_json)
            .map_err(|e| anyhow!("Failed to parse tokenizer.json: {}", e))?;

        let mut vocab = HashMap::with_capacity(data.model.vocab.len());
        let mut scores = HashMap::with_capacity(data.model.vocab.len());

        for (idx, (token, score)) in data.model.vocab.iter().enumerate() {
            let id = idx as u32;
            vocab.insert(token.clone(), id);
            scores.insert(id, *score);
        }

        // XLM-R defaults
        let mut bos_id = 0u32;
        let mut pad_id = 1u32;
        let mut eos_id = 2u32;
        let mut unk_id = data.model.unk_id.unwrap_or(3);

        for token in &data.added_tokens {
            vocab.insert(token.content.clone(), token.id);
            scores.entry(token.id).or_insert(0.0);
            match token.content.as_str() {
                "<s>" => bos_id = token.id,
                "</s>" => eos_id = token.id,
                "<pad>" => pad_id = token.id,
                "<unk>" => unk_id = token.id,
                _ => {}
            }
        }

        Ok(Self {
            vocab,
            scores,
            bos_id,
            eos_id,
            pad_id,
            unk_id,
            cache: Mutex::new(lru::LruCache::new(
                NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    pub fn encode(&self, text: &str, add_special_tokens: bool) -> Vec<u32> {
        let cache_key = format!("{}:{}", add_special_tokens as u8, text);
        if let Some(cached) = self.cache.lock().get(&cache_key) {
            return cached.clone();
        }

        let mut token_ids = Vec::new();
        if add_special_tokens {
            token_ids.push(self.bos_id);
        }
        token_ids.extend(self.tokenize_unigram(text));
        if add_special_tokens {
            token_ids.push(self.eos_id);
        }

        self.cache.lock().put(cache_key, token_ids.clone());
        token_ids
    }

    /// Truncate to `max_len` (keeping the closing token) and pad.
    /// Returns `(input_ids, attention_mask)`.
    pub fn prepare_for_model(&self, token_ids: &[u32], max_len: usize) -> (Vec<i64>, Vec<i64>) {
        let mut ids: Vec<i64> = Vec::with_capacity(max_len);
        let mut mask: Vec<i64> = Vec::with_capacity(max_len);

        let len = token_ids.len().min(max_len);
        ids.extend(token_ids[..len].iter().map(|&id| id as i64));
        if token_ids.len() > max_len && max_len > 0 {
            ids[max_len - 1] = self.eos_id as i64;
        }
        mask.resize(len, 1);

        ids.resize(max_len, self.pad_id as i64);
        mask.resize(max_len, 0);
        (ids, mask)
    }

    /// Viterbi segmentation over the unigram vocabulary
    fn tokenize_unigram(&self, text: &str) -> Vec<u32> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        // SentencePiece marks every word start with U+2581
        let processed = format!("▁{}", words.join("▁"));
        let chars: Vec<char> = processed.chars().collect();
        let n = chars.len();

        let mut best_score = vec![f32::NEG_INFINITY; n + 1];
        let mut best_edge = vec![0usize; n + 1];
        best_score[0] = 0.0;

        for end in 1..=n {
            for start in end.saturating_sub(MAX_PIECE_CHARS)..end {
                if best_score[start] == f32::NEG_INFINITY {
                    continue;
                }
                let piece: String = chars[start..end].iter().collect();
                if let Some(&id) = self.vocab.get(&piece) {
                    let score = best_score[start] + self.scores.get(&id).copied().unwrap_or(0.0);
                    if score > best_score[end] {
                        best_score[end] = score;
                        best_edge[end] = start;
                    }
                }
            }

            // Unknown character: step over it with a heavy penalty
            if best_score[end] == f32::NEG_INFINITY {
                best_score[end] = best_score[end - 1] - 10.0;
                best_edge[end] = end - 1;
            }
        }

        let mut tokens = Vec::new();
        let mut pos = n;
        while pos > 0 {
            let start = best_edge[pos];
            let piece: String = chars[start..pos].iter().collect();
            tokens.push(self.vocab.get(&piece).copied().unwrap_or(self.unk_id));
            pos = start;
        }
        tokens.reverse();

        // Consecutive unknowns collapse into one, as SentencePiece does
        tokens.dedup_by(|a, b| *a == self.unk_id && *b == self.unk_id);
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> SentencePieceTokenizer {
        let json = r#"{
            "model": {
                "type": "Unigram",
                "unk_id": 3,
                "vocab": [
                    ["<s>", 0.0], ["<pad>", 0.0], ["</s>", 0.0], ["<unk>", 0.0],
                    ["▁hoc", -1.0], ["▁phi", -1.0], ["▁h", -3.0], ["oc", -3.0],
                    ["▁", -2.0], ["p", -4.0], ["h", -4.0], ["i", -4.0]
                ]
            },
            "added_tokens": [
                {"id": 0, "content": "<s>", "special": true},
                {"id": 1, "content": "<pad>", "special": true},
                {"id": 2, "content": "</s>", "special": true},
                {"id": 3, "content": "<unk>", "special": true}
            ]
        }"#;
        SentencePieceTokenizer::from_json(json).unwrap()
    }

    #[test]
    fn test_prefers_whole_word_pieces() {
        let tok = tiny();
        assert_eq!(tok.encode("hoc phi", true), vec![0, 4, 5, 2]);
        assert_eq!(tok.encode("hoc phi", false), vec![4, 5]);
    }

    #[test]
    fn test_unknown_chars_collapse() {
        let tok = tiny();
        // "▁" then two unknown chars
        assert_eq!(tok.encode("zz", false), vec![8, 3]);
    }

    #[test]
    fn test_prepare_pads_and_truncates() {
        let tok = tiny();
        let (ids, mask) = tok.prepare_for_model(&[0, 4, 2], 5);
        assert_eq!(ids, vec![0, 4, 2, 1, 1]);
        assert_eq!(mask, vec![1, 1, 1, 0, 0]);

        let (ids, mask) = tok.prepare_for_model(&[0, 4, 5, 4, 2], 3);
        assert_eq!(ids, vec![0, 4, 2]);
        assert_eq!(mask, vec![1, 1, 1]);
    }

    #[test]
    fn test_empty_text() {
        let tok = tiny();
        assert_eq!(tok.encode("   ", true), vec![0, 2]);
    }
}
