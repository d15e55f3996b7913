use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::matching::Scorer;
use crate::persona::DEFAULT_SYSTEM_INSTRUCTION;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChatConfig {
    pub knowledge: KnowledgeConfig,
    pub history: HistoryConfig,
    pub matching: MatchingConfig,
    pub embedding: EmbeddingConfig,
    pub generative: GenerativeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub source_path: PathBuf,
    /// Record field holding the question
    pub prompt_field: String,
    /// Record field holding the answer
    pub response_field: String,
    /// Key wrapping the record list when the document is an object
    pub records_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum fuzzy score (0-100, inclusive) against curated questions
    pub lexical_cutoff: f64,
    /// Cosine similarity the best curated question must exceed
    pub semantic_threshold: f32,
    /// Minimum fuzzy score (0-100, inclusive) against earlier questions
    pub history_cutoff: f64,
    pub scorer: Scorer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub model_dir: PathBuf,
    pub max_length: usize,
    pub auto_download: bool,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    pub model: String,
    pub api_base: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: usize,
    pub system_instruction: String,
    /// Answer used when the service replies with no text
    pub no_response_text: String,
    /// Prefix of the answer shown when the service call fails
    pub error_prefix: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("trained_data.json"),
            prompt_field: "BAN".to_string(),
            response_field: "HPU".to_string(),
            records_key: Some("câu hỏi".to_string()),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chat_history.json"),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            lexical_cutoff: 80.0,
            semantic_threshold: 0.6,
            history_cutoff: 85.0,
            scorer: Scorer::WRatio,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let model_dir = if Path::new("models").exists() {
            PathBuf::from("models")
        } else if let Ok(env_path) = std::env::var("MODEL_PATH") {
            PathBuf::from(env_path)
        } else {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hpu-chat")
                .join("models")
        };

        Self {
            enabled: true,
            model_dir,
            max_length: 128,
            auto_download: true,
            cache_size: 1000,
        }
    }
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 60,
            connect_timeout_secs: 15,
            temperature: 0.7,
            max_output_tokens: 2048,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            no_response_text: "Không có phản hồi từ Gemini.".to_string(),
            error_prefix: "Lỗi khi gọi Gemini API".to_string(),
        }
    }
}

impl ChatConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        let k = &self.knowledge;
        if k.prompt_field.trim().is_empty() || k.response_field.trim().is_empty() {
            return Err("knowledge.prompt_field and knowledge.response_field must be set".into());
        }
        if k.prompt_field == k.response_field {
            return Err("knowledge.prompt_field and knowledge.response_field must differ".into());
        }

        let m = &self.matching;
        if !(0.0..=100.0).contains(&m.lexical_cutoff) {
            return Err("matching.lexical_cutoff must be in [0, 100]".into());
        }
        if !(0.0..=100.0).contains(&m.history_cutoff) {
            return Err("matching.history_cutoff must be in [0, 100]".into());
        }
        if !(-1.0..=1.0).contains(&m.semantic_threshold) {
            return Err("matching.semantic_threshold must be in [-1, 1]".into());
        }

        if self.embedding.max_length == 0 {
            return Err("embedding.max_length must be > 0".into());
        }

        let g = &self.generative;
        if g.model.trim().is_empty() {
            return Err("generative.model must be set".into());
        }
        if g.timeout_secs == 0 || g.connect_timeout_secs == 0 {
            return Err("generative timeouts must be > 0".into());
        }
        if g.api_key_env.trim().is_empty() {
            return Err("generative.api_key_env must be set".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}
