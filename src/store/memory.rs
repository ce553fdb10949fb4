//! In-process store

use super::{ConvKey, ConvRecord, ConversationStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Records kept in a map; lost on restart
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<ConvKey, ConvRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations with a stored record
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load(&self, key: &ConvKey) -> Result<ConvRecord, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, key: &ConvKey, record: &ConvRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if record.is_empty() {
            records.remove(key);
        } else {
            records.insert(*key, record.clone());
        }
        Ok(())
    }
}
