//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::{history_to_turns, ChatRole, GenerativeBackend};
use crate::config::GenerativeConfig;
use crate::error::RemoteServiceError;
use crate::history::QaEntry;

const BODY_PREVIEW_CHARS: usize = 300;

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    system_instruction: String,
    temperature: f32,
    max_output_tokens: usize,
    no_response_text: String,
}

impl GeminiBackend {
    /// Build a backend whose key is read from `config.api_key_env`.
    pub fn from_config(config: &GenerativeConfig) -> Result<Self, RemoteServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RemoteServiceError::NotConfigured(format!("{} is not set", config.api_key_env))
            })?;
        Self::new(api_key, config)
    }

    pub fn new(api_key: String, config: &GenerativeConfig) -> Result<Self, RemoteServiceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RemoteServiceError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self::with_client(client, api_key, config))
    }

    pub(crate) fn with_client(client: Client, api_key: String, config: &GenerativeConfig) -> Self {
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            config.model
        );

        tracing::info!(
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "Creating Gemini backend"
        );

        Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint,
            system_instruction: config.system_instruction.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            no_response_text: config.no_response_text.clone(),
        }
    }

    fn build_request(&self, question: &str, history: &[QaEntry]) -> Value {
        let mut contents: Vec<Value> = history_to_turns(history)
            .into_iter()
            .map(|turn| {
                let role = match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.text }] })
            })
            .collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": question }] }));

        let mut request = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        });

        if !self.system_instruction.trim().is_empty() {
            request["systemInstruction"] = json!({ "parts": [{ "text": self.system_instruction }] });
        }
        request
    }

    fn map_send_error(e: reqwest::Error) -> RemoteServiceError {
        if e.is_timeout() {
            RemoteServiceError::Timeout
        } else {
            // without_url keeps the endpoint out of logs and messages
            RemoteServiceError::Network(e.without_url().to_string())
        }
    }
}

/// Map a non-success HTTP status to the error the resolver reports.
fn status_error(status: StatusCode, body: &str) -> RemoteServiceError {
    match status.as_u16() {
        code @ (401 | 403) => RemoteServiceError::Unauthorized(code),
        429 => RemoteServiceError::QuotaExceeded,
        code => RemoteServiceError::Status {
            code,
            body: body.chars().take(BODY_PREVIEW_CHARS).collect(),
        },
    }
}

/// Parse a response body as JSON, rejecting HTML error pages from proxies.
fn parse_body(body: &str) -> Result<Value, RemoteServiceError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
        return Err(RemoteServiceError::InvalidResponse(format!(
            "HTML instead of JSON: {}",
            preview
        )));
    }
    serde_json::from_str(body).map_err(|e| RemoteServiceError::InvalidResponse(e.to_string()))
}

/// Concatenated text parts of the first candidate, trimmed. `None` when empty.
fn extract_text(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn ask(&self, question: &str, history: &[QaEntry]) -> Result<String, RemoteServiceError> {
        let request = self.build_request(question, history);
        let started = std::time::Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::map_send_error)?;

        if !status.is_success() {
            let err = status_error(status, &body);
            tracing::warn!(status = status.as_u16(), error = %err, "Gemini request failed");
            return Err(err);
        }

        let parsed = parse_body(&body)?;
        tracing::debug!(
            model = %self.model,
            history_turns = history.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Gemini answered"
        );

        match extract_text(&parsed) {
            Some(text) => Ok(text),
            None => {
                tracing::warn!(
                    finish_reason = parsed["candidates"][0]["finishReason"].as_str().unwrap_or("none"),
                    "Gemini returned no text"
                );
                Ok(self.no_response_text.clone())
            }
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}
