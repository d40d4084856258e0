//! In-memory document store, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use talkbot_core::error::StoreError;
use talkbot_core::store::{Document, DocumentStore};
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<RwLock<HashMap<String, Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, store: &str) -> Result<Document, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .get(store)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, store: &str, document: &Document) -> Result<(), StoreError> {
        self.documents
            .write()
            .await
            .insert(store.to_string(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stores_are_independent() {
        let store = InMemoryStore::new();
        store.put("lists", "shopping", json!(["eggs"])).await.unwrap();
        store.put("memory", "shopping", json!("weekly")).await.unwrap();

        assert_eq!(
            store.get("lists", "shopping").await.unwrap(),
            Some(json!(["eggs"]))
        );
        assert_eq!(
            store.get("memory", "shopping").await.unwrap(),
            Some(json!("weekly"))
        );
        assert_eq!(store.get("memory", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_contents() {
        let store = InMemoryStore::new();
        let other = store.clone();
        store.put("memory", "k", json!("v")).await.unwrap();
        assert_eq!(other.load("memory").await.unwrap().len(), 1);
    }
}
