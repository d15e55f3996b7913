//! Auto-download of the sentence embedding model from HuggingFace
//!
//! Fetches the ONNX export of sentence-transformers/paraphrase-multilingual-mpnet-base-v2
//! (~1.1 GB) and its tokenizer on first run.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::encoder::MODEL_DIR_NAME;

const HF_BASE: &str = "https://huggingface.co";
const MODEL_REPO: &str = "sentence-transformers/paraphrase-multilingual-mpnet-base-v2";

/// (path inside the repo, local file name, minimum plausible size)
struct ModelFile {
    url_path: &'static str,
    local_name: &'static str,
    min_bytes: u64,
}

const MODEL_FILES: &[ModelFile] = &[
    ModelFile {
        url_path: "onnx/model.onnx",
        local_name: "model.onnx",
        min_bytes: 100_000_000,
    },
    ModelFile {
        url_path: "tokenizer.json",
        local_name: "tokenizer.json",
        min_bytes: 10_000,
    },
];

const MAX_RETRIES: u32 = 3;

/// Make sure the embedding model is present under `model_dir`, downloading
/// missing or truncated files. Returns the model directory.
pub async fn ensure_model(model_dir: &Path) -> Result<PathBuf> {
    let target_dir = model_dir.join(MODEL_DIR_NAME);

    let missing: Vec<&ModelFile> = MODEL_FILES
        .iter()
        .filter(|f| is_missing(&target_dir.join(f.local_name), f.min_bytes))
        .collect();

    if missing.is_empty() {
        return Ok(target_dir);
    }

    tracing::info!(
        repo = MODEL_REPO,
        missing_files = missing.len(),
        dir = %target_dir.display(),
        "Downloading embedding model from HuggingFace"
    );

    tokio::fs::create_dir_all(&target_dir).await.map_err(|e| {
        anyhow!(
            "Failed to create model directory {}: {}",
            target_dir.display(),
            e
        )
    })?;

    let client = reqwest::Client::builder()
        .user_agent("hpu-chat/0.1")
        .timeout(Duration::from_secs(1800))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

    for file in &missing {
        let url = format!("{}/{}/resolve/main/{}", HF_BASE, MODEL_REPO, file.url_path);
        let dest = target_dir.join(file.local_name);
        download_with_retry(&client, &url, &dest, file.local_name).await?;
    }

    tracing::info!(repo = MODEL_REPO, "Embedding model downloaded");
    Ok(target_dir)
}

fn is_missing(path: &Path, min_bytes: u64) -> bool {
    match path.metadata() {
        Ok(meta) => meta.len() < min_bytes,
        Err(_) => true,
    }
}

async fn download_with_retry(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    filename: &str,
) -> Result<()> {
    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        match download_streaming(client, url, dest, filename).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(file = filename, attempt, error = %e, "Download failed");
                last_error = Some(e);
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("Download failed after {} retries", MAX_RETRIES)))
}

/// Stream into `<dest>.downloading`, then rename into place.
async fn download_streaming(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    filename: &str,
) -> Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow!("HTTP request failed for {}: {}", filename, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("HTTP {} downloading {}", status, filename));
    }

    let total_size = response.content_length().unwrap_or(0);
    tracing::info!(
        file = filename,
        size_mb = format!("{:.1}", total_size as f64 / 1_048_576.0),
        "Downloading"
    );

    let tmp_dest = dest.with_extension("downloading");
    let mut file = tokio::fs::File::create(&tmp_dest)
        .await
        .map_err(|e| anyhow!("Failed to create {}: {}", tmp_dest.display(), e))?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_log_pct: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&tmp_dest).await;
                return Err(anyhow!("Stream error downloading {}: {}", filename, e));
            }
        };
        file.write_all(&chunk)
            .await
            .map_err(|e| anyhow!("Write error for {}: {}", filename, e))?;
        downloaded += chunk.len() as u64;

        if total_size > 0 {
            let pct = downloaded * 100 / total_size;
            if pct >= last_log_pct + 10 {
                last_log_pct = pct - pct % 10;
                tracing::info!(
                    file = filename,
                    progress = format!("{}%", last_log_pct),
                    "Download progress"
                );
            }
        }
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_dest, dest)
        .await
        .map_err(|e| anyhow!("Failed to finalize {}: {}", filename, e))?;

    tracing::info!(
        file = filename,
        size_mb = format!("{:.1}", downloaded as f64 / 1_048_576.0),
        "Download complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_missing_checks_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        assert!(is_missing(&path, 10));
        std::fs::write(&path, b"short").unwrap();
        assert!(is_missing(&path, 10));
        std::fs::write(&path, b"long enough content").unwrap();
        assert!(!is_missing(&path, 10));
    }

    #[tokio::test]
    async fn test_present_files_skip_download() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(MODEL_DIR_NAME);
        std::fs::create_dir_all(&target).unwrap();
        for file in MODEL_FILES {
            let f = std::fs::File::create(target.join(file.local_name)).unwrap();
            f.set_len(file.min_bytes).unwrap();
        }

        let resolved = ensure_model(dir.path()).await.unwrap();
        assert_eq!(resolved, target);
    }
}
