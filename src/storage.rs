//! Key/value persistence for session state.
//!
//! DESIGN
//! ======
//! Entries are wrapped in a tagged envelope (`kind` + `payload`) so a text
//! value that happens to start with `{` or `[` can never be mistaken for a
//! structured one. `FileStorage` keeps the whole store in a single JSON
//! file and rewrites it per mutation; the store holds three small keys, so
//! read-modify-write is cheap and keeps the on-disk shape trivially
//! inspectable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),

    /// An entry exists but does not decode as a tagged envelope.
    #[error("corrupt storage entry for key '{key}'")]
    Corrupt { key: String },

    /// The backing file exists but is not a valid store.
    #[error("corrupt storage file {path}: {detail}")]
    CorruptFile { path: String, detail: String },

    #[error("storage encode failure: {0}")]
    Encode(String),
}

// =============================================================================
// VALUE ENVELOPE
// =============================================================================

/// A stored value, explicitly tagged as plain text or structured JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum StorageValue {
    Text(String),
    Json(Value),
}

impl StorageValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Json(_) => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Text(_) => None,
        }
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// Narrow synchronous key/value persistence contract.
pub trait Storage: Send + Sync {
    /// Write a value under `key`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing store cannot be written.
    fn set(&self, key: &str, value: StorageValue) -> Result<(), StorageError>;

    /// Read the value under `key`; absent keys are `None`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing store cannot be read or
    /// the entry is corrupt.
    fn get(&self, key: &str) -> Result<Option<StorageValue>, StorageError>;

    /// Delete the entry under `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// MEMORY
// =============================================================================

/// In-process store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, StorageValue>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, StorageValue>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn set(&self, key: &str, value: StorageValue) -> Result<(), StorageError> {
        self.entries().insert(key.to_owned(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<StorageValue>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// Durable store: one JSON object file, keys mapped to tagged envelopes.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under `<home>/.basebuild/session.json`. `None` when the home
    /// directory cannot be determined.
    #[must_use]
    pub fn in_home_dir() -> Option<Self> {
        let home = dirs::home_dir()?;
        Some(Self::new(home.join(".basebuild").join("session.json")))
    }

    fn load(&self) -> Result<HashMap<String, StorageValue>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content).map_err(|e| StorageError::CorruptFile {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })
    }

    fn persist(&self, entries: &HashMap<String, StorageValue>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Encode(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn set(&self, key: &str, value: StorageValue) -> Result<(), StorageError> {
        let mut entries = self.load()?;
        entries.insert(key.to_owned(), value);
        self.persist(&entries)
    }

    fn get(&self, key: &str) -> Result<Option<StorageValue>, StorageError> {
        Ok(self.load()?.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
