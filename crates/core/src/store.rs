//! The keyed JSON document store consumed by the list and memory tools.
//!
//! A store holds named documents (`"lists"`, `"memory"`), each a JSON object
//! keyed by entry name.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// One JSON object per store name.
pub type Document = Map<String, Value>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs ("file", "in_memory").
    fn name(&self) -> &str;

    /// Load a whole document. A missing document is empty, not an error.
    async fn load(&self, store: &str) -> Result<Document, StoreError>;

    /// Replace a whole document.
    async fn save(&self, store: &str, document: &Document) -> Result<(), StoreError>;

    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.load(store).await?.remove(key))
    }

    async fn put(&self, store: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut document = self.load(store).await?;
        document.insert(key.to_string(), value);
        self.save(store, &document).await
    }

    /// Remove an entry, returning its previous value.
    async fn remove(&self, store: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let mut document = self.load(store).await?;
        let previous = document.shift_remove(key);
        if previous.is_some() {
            self.save(store, &document).await?;
        }
        Ok(previous)
    }
}
