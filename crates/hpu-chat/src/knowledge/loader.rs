//! Reads the curated Q&A document.
//!
//! Accepted shapes:
//! - `[ {"<prompt>": "...", "<response>": "..."}, ... ]`
//! - `{ "<records_key>": [ ... ] }`
//!
//! Loading never fails: a missing or malformed document yields an empty
//! knowledge base and an error in the log.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::KnowledgeBase;
use crate::config::KnowledgeConfig;
use crate::error::ParseError;
use crate::text::normalize;

#[derive(Debug, Clone)]
pub struct KnowledgeSource {
    pub path: PathBuf,
    pub prompt_field: String,
    pub response_field: String,
    pub records_key: Option<String>,
}

impl From<&KnowledgeConfig> for KnowledgeSource {
    fn from(config: &KnowledgeConfig) -> Self {
        Self {
            path: config.source_path.clone(),
            prompt_field: config.prompt_field.clone(),
            response_field: config.response_field.clone(),
            records_key: config.records_key.clone(),
        }
    }
}

pub fn load(source: &KnowledgeSource) -> KnowledgeBase {
    if !source.path.exists() {
        tracing::error!(path = %source.path.display(), "Knowledge source does not exist");
        return KnowledgeBase::default();
    }

    match read(source) {
        Ok(kb) => {
            tracing::info!(
                path = %source.path.display(),
                questions = kb.len(),
                "Loaded knowledge base"
            );
            kb
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load knowledge source");
            KnowledgeBase::default()
        }
    }
}

fn read(source: &KnowledgeSource) -> Result<KnowledgeBase, ParseError> {
    let content = std::fs::read_to_string(&source.path).map_err(|e| ParseError::Io {
        path: source.path.clone(),
        source: e,
    })?;
    parse(&content, source)
}

/// Parse a document already in memory.
pub fn parse(content: &str, source: &KnowledgeSource) -> Result<KnowledgeBase, ParseError> {
    let doc: Value = serde_json::from_str(content).map_err(|e| ParseError::Json {
        path: source.path.clone(),
        source: e,
    })?;

    let records = record_list(&doc, source)?;

    let mut pairs = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let Some(obj) = record.as_object() else {
            tracing::warn!(record = idx, "Skipping knowledge record that is not an object");
            continue;
        };
        let prompt = obj.get(&source.prompt_field).and_then(field_text);
        let response = obj.get(&source.response_field).and_then(field_text);
        match (prompt, response) {
            (Some(q), _) if normalize(&q).is_empty() => {
                tracing::warn!(record = idx, question = %q, "Skipping knowledge record with no matchable text");
            }
            (Some(q), Some(a)) => pairs.push((q, a)),
            _ => {
                tracing::warn!(
                    record = idx,
                    prompt_field = %source.prompt_field,
                    response_field = %source.response_field,
                    "Skipping knowledge record missing a required field"
                );
            }
        }
    }

    Ok(KnowledgeBase::from_pairs(pairs))
}

fn record_list<'a>(doc: &'a Value, source: &KnowledgeSource) -> Result<&'a Vec<Value>, ParseError> {
    match doc {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            let key = source.records_key.as_deref().ok_or_else(|| shape_error(
                &source.path,
                "top-level object but no records key configured".to_string(),
            ))?;
            match map.get(key) {
                Some(Value::Array(items)) => Ok(items),
                Some(other) => Err(shape_error(
                    &source.path,
                    format!("'{}' must be a list, got {}", key, kind(other)),
                )),
                None => Err(shape_error(
                    &source.path,
                    format!("object has no '{}' key", key),
                )),
            }
        }
        other => Err(shape_error(
            &source.path,
            format!("expected a list or an object, got {}", kind(other)),
        )),
    }
}

/// Spreadsheet exports turn numeric cells into JSON numbers; accept them.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn shape_error(path: &Path, detail: String) -> ParseError {
    ParseError::Shape {
        path: path.to_path_buf(),
        detail,
    }
}
