use anyhow::{anyhow, Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionOutputs};
use ort::value::Value;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use super::tokenizer::SentencePieceTokenizer;
use super::EmbeddingModel;
use crate::config::EmbeddingConfig;

/// Directory name of the multilingual paraphrase model under `model_dir`.
pub const MODEL_DIR_NAME: &str = "paraphrase-multilingual-mpnet-base-v2";

const BATCH_SIZE: usize = 16;

#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub model_path: PathBuf,
    pub dimension: usize,
    pub max_length: usize,
    pub normalize: bool,
    pub cache_size: usize,
}

impl EncoderConfig {
    /// Locate an ONNX export inside `model_dir`, preferring optimized variants.
    pub fn auto_detect(model_dir: &Path, max_length: usize, cache_size: usize) -> Option<Self> {
        let base_path = model_dir.join(MODEL_DIR_NAME);
        let model_path = ["model_O4.onnx", "model_quantized.onnx", "model.onnx"]
            .iter()
            .map(|file| base_path.join(file))
            .find(|path| path.exists())?;

        if !base_path.join("tokenizer.json").exists() {
            return None;
        }

        Some(Self {
            model_path,
            dimension: 768,
            max_length,
            normalize: true,
            cache_size,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Option<Self> {
        Self::auto_detect(&config.model_dir, config.max_length, config.cache_size)
    }
}

/// Mean-pooled sentence embeddings from an ONNX transformer.
pub struct SentenceEncoder {
    session: Mutex<Session>,
    tokenizer: SentencePieceTokenizer,
    config: EncoderConfig,
    cache: Mutex<lru::LruCache<String, Vec<f32>>>,
}

impl SentenceEncoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        ort::init().with_name("hpu_chat_encoder").commit();

        if !config.model_path.exists() {
            return Err(anyhow!(
                "Model file not found at: {}",
                config.model_path.display()
            ));
        }

        let model_bytes = std::fs::read(&config.model_path)
            .with_context(|| format!("Failed to read model {}", config.model_path.display()))?;

        let model_dir = config
            .model_path
            .parent()
            .ok_or_else(|| anyhow!("Invalid model path"))?;

        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let session = Session::builder()
            .map_err(|e| anyhow!("Session builder: {:?}", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("Optimization level: {:?}", e))?
            .with_intra_threads(num_threads)
            .map_err(|e| anyhow!("Intra threads: {:?}", e))?
            .with_inter_threads(1)
            .map_err(|e| anyhow!("Inter threads: {:?}", e))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| anyhow!("Failed to load model: {:?}", e))?;

        let tokenizer = SentencePieceTokenizer::from_model_dir(model_dir)?;

        tracing::info!(
            model = %config.model_path.display(),
            dimension = config.dimension,
            max_length = config.max_length,
            "Sentence encoder ready"
        );

        let cache_size = NonZeroUsize::new(config.cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            config,
            cache: Mutex::new(lru::LruCache::new(cache_size)),
        })
    }

    pub fn encode(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.lock().get(text) {
            return Ok(cached.clone());
        }

        let mut batch = self.encode_batch(&[text])?;
        let embedding = batch
            .pop()
            .ok_or_else(|| anyhow!("Model produced no embedding"))?;

        self.cache.lock().put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let token_ids: Vec<Vec<u32>> = batch
                .iter()
                .map(|text| self.tokenizer.encode(text, true))
                .collect();

            let padded_len = token_ids
                .iter()
                .map(|ids| ids.len())
                .max()
                .unwrap_or(0)
                .min(self.config.max_length)
                .max(1);
            let batch_size = token_ids.len();

            let mut input_ids_flat = Vec::with_capacity(batch_size * padded_len);
            let mut attention_mask_flat = Vec::with_capacity(batch_size * padded_len);
            for ids in &token_ids {
                let (ids, mask) = self.tokenizer.prepare_for_model(ids, padded_len);
                input_ids_flat.extend(ids);
                attention_mask_flat.extend(mask);
            }

            let shape = vec![batch_size, padded_len];
            let input_ids = Value::from_array((shape.clone(), input_ids_flat))
                .map_err(|e| anyhow!("input_ids tensor: {:?}", e))?;
            let attention_mask = Value::from_array((shape, attention_mask_flat.clone()))
                .map_err(|e| anyhow!("attention_mask tensor: {:?}", e))?;

            let inputs = ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ];

            let mut session = self.session.lock();
            let outputs = session
                .run(inputs)
                .map_err(|e| anyhow!("Batch inference failed: {:?}", e))?;

            let pooled = self.pool_outputs(&outputs, &attention_mask_flat, batch_size, padded_len)?;
            all_embeddings.extend(pooled);
        }

        Ok(all_embeddings)
    }

    fn pool_outputs(
        &self,
        outputs: &SessionOutputs,
        attention_mask: &[i64],
        batch_size: usize,
        padded_len: usize,
    ) -> Result<Vec<Vec<f32>>> {
        // Some exports already contain the pooled sentence vector
        if outputs.iter().any(|(name, _)| name == "sentence_embedding") {
            let (shape, data) = outputs["sentence_embedding"]
                .try_extract_tensor::<f32>()
                .map_err(|e| anyhow!("sentence_embedding: {:?}", e))?;
            return Ok(split_pooled(&shape[..], data, batch_size)?
                .into_iter()
                .map(|row| self.normalize_vec(row))
                .collect());
        }

        let output_name = outputs
            .iter()
            .map(|(name, _)| name.to_string())
            .find(|name| name == "last_hidden_state" || name == "token_embeddings")
            .or_else(|| outputs.iter().next().map(|(name, _)| name.to_string()))
            .ok_or_else(|| anyhow!("Model returned no outputs"))?;

        let (shape, data) = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("Failed to extract output '{}': {:?}", output_name, e))?;
        if shape.len() != 3 {
            return Err(anyhow!("Unexpected output rank {} for '{}'", shape.len(), output_name));
        }

        let seq_len = shape[1] as usize;
        let hidden_dim = shape[2] as usize;
        if data.len() < batch_size * seq_len * hidden_dim {
            return Err(anyhow!("Output '{}' is shorter than its shape", output_name));
        }

        let mut embeddings = Vec::with_capacity(batch_size);
        for sample in 0..batch_size {
            let mask = &attention_mask[sample * padded_len..(sample + 1) * padded_len];
            let sample_offset = sample * seq_len * hidden_dim;
            let mut pooled = vec![0.0f32; hidden_dim];
            let mut mask_sum = 0.0f32;

            for (pos, &m) in mask.iter().enumerate().take(seq_len) {
                if m == 0 {
                    continue;
                }
                mask_sum += 1.0;
                let offset = sample_offset + pos * hidden_dim;
                for (dim, value) in pooled.iter_mut().enumerate() {
                    *value += data[offset + dim];
                }
            }

            if mask_sum > 0.0 {
                for value in &mut pooled {
                    *value /= mask_sum;
                }
            }
            embeddings.push(self.normalize_vec(pooled));
        }

        Ok(embeddings)
    }

    fn normalize_vec(&self, mut vec: Vec<f32>) -> Vec<f32> {
        if self.config.normalize {
            let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 1e-12 {
                for v in &mut vec {
                    *v /= norm;
                }
            }
        }
        vec
    }
}

/// Rows of an already pooled `[batch, hidden]` output.
fn split_pooled(shape: &[i64], data: &[f32], batch_size: usize) -> Result<Vec<Vec<f32>>> {
    if shape.len() != 2 {
        return Err(anyhow!("Unexpected sentence_embedding rank {}", shape.len()));
    }
    let hidden_dim = shape[1] as usize;
    if hidden_dim == 0 || data.len() < batch_size * hidden_dim {
        return Err(anyhow!(
            "sentence_embedding holds {} values, expected {}x{}",
            data.len(),
            batch_size,
            hidden_dim
        ));
    }
    Ok(data
        .chunks_exact(hidden_dim)
        .take(batch_size)
        .map(<[f32]>::to_vec)
        .collect())
}

impl EmbeddingModel for SentenceEncoder {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(text)
    }

    fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(text)
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.encode_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pooled_checks_rank_and_length() {
        let rows = split_pooled(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2).unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);

        assert!(split_pooled(&[6], &[0.0; 6], 2).is_err());
        assert!(split_pooled(&[2, 3], &[0.0; 4], 2).is_err());
        assert!(split_pooled(&[2, 0], &[], 2).is_err());
    }

    #[test]
    fn test_auto_detect_requires_model_and_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EncoderConfig::auto_detect(dir.path(), 128, 10).is_none());

        let base = dir.path().join(MODEL_DIR_NAME);
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("model.onnx"), b"onnx").unwrap();
        assert!(EncoderConfig::auto_detect(dir.path(), 128, 10).is_none());

        std::fs::write(base.join("tokenizer.json"), b"{}").unwrap();
        let config = EncoderConfig::auto_detect(dir.path(), 128, 10).unwrap();
        assert_eq!(config.model_path, base.join("model.onnx"));
        assert_eq!(config.dimension, 768);
        assert_eq!(config.max_length, 128);
    }

    #[test]
    fn test_auto_detect_prefers_optimized_export() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join(MODEL_DIR_NAME);
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("model.onnx"), b"onnx").unwrap();
        std::fs::write(base.join("model_O4.onnx"), b"onnx").unwrap();
        std::fs::write(base.join("tokenizer.json"), b"{}").unwrap();

        let config = EncoderConfig::auto_detect(dir.path(), 64, 10).unwrap();
        assert_eq!(config.model_path, base.join("model_O4.onnx"));
    }
}
