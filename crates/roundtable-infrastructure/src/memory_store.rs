//! In-memory communal memory store.

use async_trait::async_trait;
use roundtable_core::error::Result;
use roundtable_core::memory::{CommunalDocument, MemoryStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A [`MemoryStore`] backed by a process-local map.
///
/// Suitable for tests and single-process deployments; documents do not
/// survive a restart.
#[derive(Default)]
pub struct InMemoryMemoryStore {
    documents: RwLock<HashMap<String, CommunalDocument>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn get_document(
        &self,
        handle: &str,
        _requesting_user_id: &str,
    ) -> Result<Option<CommunalDocument>> {
        Ok(self.documents.read().await.get(handle).cloned())
    }

    async fn put_document(
        &self,
        handle: &str,
        data: serde_json::Value,
        _requesting_user_id: &str,
    ) -> Result<()> {
        self.documents.write().await.insert(
            handle.to_string(),
            CommunalDocument {
                data,
                updated_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryMemoryStore::new();
        assert!(store.is_empty().await);

        store
            .put_document("session-room-1", serde_json::json!({"topic": "t"}), "owner")
            .await
            .unwrap();

        let doc = store
            .get_document("session-room-1", "owner")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["topic"], serde_json::json!("t"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_handle_is_none() {
        let store = InMemoryMemoryStore::new();
        assert!(store.get_document("nope", "owner").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites_whole_document() {
        let store = InMemoryMemoryStore::new();
        store
            .put_document("h", serde_json::json!({"a": 1, "b": 2}), "owner")
            .await
            .unwrap();
        store
            .put_document("h", serde_json::json!({"a": 3}), "owner")
            .await
            .unwrap();

        let doc = store.get_document("h", "owner").await.unwrap().unwrap();
        assert_eq!(doc.data, serde_json::json!({"a": 3}));
    }
}
