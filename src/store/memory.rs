//! In-memory document store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentStore, StoreError};

type Document = HashMap<String, String>;

/// Process-local [`DocumentStore`]. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(String, String), Document>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a whole document.
    pub async fn document(&self, collection: &str, document: &str) -> Option<Document> {
        self.documents
            .read()
            .await
            .get(&(collection.to_string(), document.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn set_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.documents
            .write()
            .await
            .entry((collection.to_string(), document.to_string()))
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn get_field(
        &self,
        collection: &str,
        document: &str,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .get(&(collection.to_string(), document.to_string()))
            .and_then(|doc| doc.get(field).cloned()))
    }
}
