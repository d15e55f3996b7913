use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use hpu_chat::config::EmbeddingConfig;
use hpu_chat::embeddings::{download::ensure_model, EmbeddingModel, EncoderConfig, SentenceEncoder};
use hpu_chat::{
    knowledge, AnswerResolver, ChatConfig, GeminiBackend, GenerativeBackend, JsonHistoryStore,
    KnowledgeBase, KnowledgeSource, PipelineContext, ResolveError, SemanticIndex,
    UnconfiguredBackend,
};

const CONFIG_ENV: &str = "HPU_CHAT_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = load_config()?;

    let knowledge = knowledge::load(&KnowledgeSource::from(&config.knowledge));
    let semantic = build_semantic_index(&config.embedding, &knowledge).await;
    let context = PipelineContext::new(knowledge, semantic, Box::new(config.matching.scorer));

    let history = Arc::new(JsonHistoryStore::new(config.history.path.clone()));
    tracing::info!(path = %history.path().display(), "Using history file");

    let generative: Arc<dyn GenerativeBackend> = match GeminiBackend::from_config(&config.generative) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            tracing::warn!(error = %e, "Generative fallback unavailable");
            Arc::new(UnconfiguredBackend::new(e.to_string()))
        }
    };

    let resolver = AnswerResolver::new(context, history, generative).with_config(&config);
    run_session(&resolver).await
}

fn load_config() -> Result<ChatConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);

    match path {
        Some(path) => ChatConfig::from_file(&path)
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let config = ChatConfig::default();
            config.validate().map_err(|e| anyhow!(e))?;
            Ok(config)
        }
    }
}

/// Semantic matching is optional: any failure here leaves the pipeline
/// running with the lexical and history strategies only.
async fn build_semantic_index(
    config: &EmbeddingConfig,
    knowledge: &KnowledgeBase,
) -> Option<SemanticIndex> {
    if !config.enabled {
        tracing::info!("Semantic matching disabled");
        return None;
    }
    if knowledge.is_empty() {
        return None;
    }

    if config.auto_download {
        if let Err(e) = ensure_model(&config.model_dir).await {
            tracing::warn!(error = %e, "Embedding model download failed");
        }
    }

    let Some(encoder_config) = EncoderConfig::from_config(config) else {
        tracing::warn!(
            dir = %config.model_dir.display(),
            "No embedding model found, semantic matching disabled"
        );
        return None;
    };

    let knowledge = knowledge.clone();
    let built = tokio::task::spawn_blocking(move || -> Result<SemanticIndex> {
        let encoder: Arc<dyn EmbeddingModel> = Arc::new(SentenceEncoder::new(encoder_config)?);
        SemanticIndex::build(&knowledge, encoder)
    })
    .await;

    match built {
        Ok(Ok(index)) => Some(index),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Failed to build semantic index, semantic matching disabled");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Semantic index task panicked");
            None
        }
    }
}

async fn run_session(resolver: &AnswerResolver) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("HPU chatbot. Type /history to show the conversation, /quit to exit.");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                for entry in resolver.get_history() {
                    println!("Bạn: {}\nHPU: {}\n", entry.question, entry.answer);
                }
            }
            _ => match resolver.resolve(question).await {
                Ok(answer) => println!("{}\n", answer),
                Err(ResolveError::EmptyQuestion) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Could not record the conversation");
                    eprintln!("Error: {}", e);
                }
            },
        }
    }
    Ok(())
}
