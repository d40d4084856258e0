//! File-based document store: one pretty-printed JSON file per store name.
//!
//! Storage location: `<data_dir>/<store>.json` (by default `~/.talkbot`).
//! The files are small and human-editable, so every operation reads the
//! file fresh and every mutation rewrites it whole.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use talkbot_core::error::StoreError;
use talkbot_core::store::{Document, DocumentStore};
use tracing::{debug, warn};

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, store: &str) -> Result<PathBuf, StoreError> {
        let valid = !store.is_empty()
            && store
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::Storage(format!("Invalid store name '{store}'")));
        }
        Ok(self.dir.join(format!("{store}.json")))
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, store: &str) -> Result<Document, StoreError> {
        let path = self.path_for(store)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            // Not written yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "Ignoring unreadable store file");
                Ok(Document::new())
            }
        }
    }

    async fn save(&self, store: &str, document: &Document) -> Result<(), StoreError> {
        let path = self.path_for(store)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreError::Storage(format!("Failed to create data directory: {e}"))
        })?;

        let content = serde_json::to_string_pretty(document)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write {}: {e}", path.display())))?;

        debug!(path = %path.display(), entries = document.len(), "Store saved");
        Ok(())
    }
}
