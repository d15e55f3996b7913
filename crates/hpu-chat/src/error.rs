//! Error taxonomy for the answer pipeline.
//!
//! - [`ParseError`] is recovered where it happens: loaders log it and fall
//!   back to empty data.
//! - [`PersistenceError`] is loud and propagates to the caller of `resolve`.
//! - [`RemoteServiceError`] is turned into chat text by the resolver.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected document shape in {path}: {detail}")]
    Shape { path: PathBuf, detail: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("cannot read history file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write history file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize history for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum RemoteServiceError {
    #[error("generative service timed out")]
    Timeout,

    #[error("network error talking to generative service: {0}")]
    Network(String),

    #[error("generative service rejected the credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("generative service quota exhausted")]
    QuotaExceeded,

    #[error("generative service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("generative service returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("generative backend is not configured: {0}")]
    NotConfigured(String),
}

impl RemoteServiceError {
    /// Short label safe to show to end users. Never includes bodies, URLs or keys.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::Network(_) => "network error".to_string(),
            Self::Unauthorized(_) => "authentication failed".to_string(),
            Self::QuotaExceeded => "quota exceeded".to_string(),
            Self::Status { code, .. } => format!("service error (HTTP {})", code),
            Self::InvalidResponse(_) => "invalid response".to_string(),
            Self::NotConfigured(_) => "service not configured".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
