//! File-backed history: a pretty-printed JSON array rewritten on every append.
//!
//! The whole log is rewritten each time, which is fine for the few thousand
//! turns a single deployment accumulates. Every read-modify-write runs under
//! one lock so concurrent appends cannot overwrite each other.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{HistoryStore, QaEntry};
use crate::error::{ParseError, PersistenceError};

pub struct JsonHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw entries, `None` when the file does not exist yet.
    fn read_raw(&self) -> Result<Option<Vec<Value>>, ParseError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| ParseError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let doc: Value = serde_json::from_str(&content).map_err(|e| ParseError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        match doc {
            Value::Array(items) => Ok(Some(items)),
            _ => Err(ParseError::Shape {
                path: self.path.clone(),
                detail: "history must be a list".to_string(),
            }),
        }
    }

    /// Write to a sibling temp file, then rename over the log.
    fn write_raw(&self, items: &[Value]) -> Result<(), PersistenceError> {
        let write_err = |source: std::io::Error| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        let body = serde_json::to_vec_pretty(items).map_err(|e| PersistenceError::Serialize {
            path: self.path.clone(),
            source: e,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = self.sibling("tmp");
        std::fs::write(&tmp, &body).map_err(write_err)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(write_err(e));
        }
        Ok(())
    }

    /// Move an unreadable log out of the way instead of overwriting it.
    fn quarantine(&self) -> Result<PathBuf, PersistenceError> {
        let target = self.sibling(&format!("corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ")));
        std::fs::rename(&self.path, &target).map_err(|e| PersistenceError::Write {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(target)
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        self.path.with_file_name(format!("{}.{}", name, suffix))
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> Vec<QaEntry> {
        let _guard = self.lock.lock();

        let items = match self.read_raw() {
            Ok(Some(items)) => items,
            Ok(None) => {
                tracing::warn!(path = %self.path.display(), "History file does not exist, creating it");
                if let Err(e) = self.write_raw(&[]) {
                    tracing::warn!(error = %e, "Could not create empty history file");
                }
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read history, continuing with empty history");
                return Vec::new();
            }
        };

        items
            .into_iter()
            .enumerate()
            .filter_map(|(idx, item)| match serde_json::from_value::<QaEntry>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(entry = idx, error = %e, "Skipping malformed history entry");
                    None
                }
            })
            .collect()
    }

    fn append(&self, question: &str, answer: &str) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock();

        let mut items = match self.read_raw() {
            Ok(Some(items)) => items,
            Ok(None) => Vec::new(),
            Err(ParseError::Io { path, source }) => {
                tracing::error!(path = %path.display(), error = %source, "Cannot read history before append");
                return Err(PersistenceError::Read { path, source });
            }
            Err(e) => {
                let moved_to = self.quarantine()?;
                tracing::warn!(
                    error = %e,
                    moved_to = %moved_to.display(),
                    "History file unreadable, starting a new log"
                );
                Vec::new()
            }
        };

        let entry = serde_json::to_value(QaEntry::new(question, answer)).map_err(|e| {
            PersistenceError::Serialize {
                path: self.path.clone(),
                source: e,
            }
        })?;
        items.push(entry);
        self.write_raw(&items)?;

        tracing::debug!(
            path = %self.path.display(),
            entries = items.len(),
            "Appended history entry"
        );
        Ok(())
    }
}
