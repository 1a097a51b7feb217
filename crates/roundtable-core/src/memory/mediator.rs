//! Session-side communal memory mediation.

use super::store::{CommunalDocument, MemoryStore};
use crate::error::{CoreError, ErrorContext, Result};
use crate::session::Session;
use std::sync::Arc;

/// Structural changes the mediator can apply to a communal document.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    ParticipantAdded {
        participant_id: String,
        name: String,
        role: Option<String>,
    },
    ParticipantRemoved {
        participant_id: String,
    },
    ContextUpdate {
        context: serde_json::Map<String, serde_json::Value>,
    },
    InsightShared {
        participant_id: String,
        insight: String,
        context: serde_json::Map<String, serde_json::Value>,
    },
}

impl MemoryEvent {
    fn name(&self) -> &'static str {
        match self {
            MemoryEvent::ParticipantAdded { .. } => "participant_added",
            MemoryEvent::ParticipantRemoved { .. } => "participant_removed",
            MemoryEvent::ContextUpdate { .. } => "context_update",
            MemoryEvent::InsightShared { .. } => "insight_shared",
        }
    }
}

/// Translates session-level facts into reads and writes against the
/// external store contract.
///
/// Every mutation is read-modify-write on the whole document, last writer
/// wins. Failures here are best-effort relative to the authoritative
/// in-memory session state: callers log and meter them but never roll back
/// the session-side event that was already appended.
pub struct CommunalMemoryMediator {
    store: Arc<dyn MemoryStore>,
}

impl CommunalMemoryMediator {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Allocates a communal memory handle for a new session and seeds the
    /// backing document.
    pub async fn initialize_session(&self, session_id: &str, topic: &str, user_id: &str) -> Result<String> {
        let handle = format!("session-{session_id}");
        let seed = CommunalDocument::seed(session_id, topic);
        self.store
            .put_document(&handle, seed.data, user_id)
            .await?;
        Ok(handle)
    }

    /// Applies one structural change to the session's communal document.
    ///
    /// Returns `CommunalMemory` if the session has no memory handle or the
    /// handle is stale, and forwards `VaultIntegration` failures from the
    /// store untouched.
    pub async fn apply_event(&self, session: &Session, event: MemoryEvent) -> Result<()> {
        let context = ErrorContext::new("apply_event")
            .with_session(&session.id)
            .with_user(&session.created_by)
            .with_metadata("event", serde_json::json!(event.name()));

        let handle = session.communal_memory_id.as_deref().ok_or_else(|| {
            CoreError::communal_memory(
                format!(
                    "session '{}' has no communal memory handle",
                    session.id
                ),
                context.clone(),
            )
        })?;

        let document = self
            .store
            .get_document(handle, &session.created_by)
            .await?
            .ok_or_else(|| {
                CoreError::communal_memory(
                    format!("communal memory handle '{handle}' is stale"),
                    context.clone(),
                )
            })?;

        let mut data = document.data;
        apply_to_document(&mut data, &event);

        self.store
            .put_document(handle, data, &session.created_by)
            .await?;

        tracing::debug!(
            session_id = %session.id,
            event = event.name(),
            "communal memory updated"
        );
        Ok(())
    }
}

/// Applies a [`MemoryEvent`] to the opaque document map in place.
fn apply_to_document(data: &mut serde_json::Value, event: &MemoryEvent) {
    let now = chrono::Utc::now().to_rfc3339();
    match event {
        MemoryEvent::ParticipantAdded {
            participant_id,
            name,
            role,
        } => {
            if let Some(list) = ensure_array(data, "participants") {
                list.push(serde_json::json!({
                    "id": participant_id,
                    "name": name,
                    "role": role,
                    "joined_at": now,
                }));
            }
        }
        MemoryEvent::ParticipantRemoved { participant_id } => {
            if let Some(list) = ensure_array(data, "participants") {
                for entry in list.iter_mut() {
                    if entry.get("id").and_then(|v| v.as_str()) == Some(participant_id) {
                        entry["left_at"] = serde_json::json!(now);
                        break;
                    }
                }
            }
        }
        MemoryEvent::ContextUpdate { context } => {
            if let Some(map) = data
                .as_object_mut()
                .and_then(|root| root.entry("context").or_insert(serde_json::json!({})).as_object_mut())
            {
                for (key, value) in context {
                    map.insert(key.clone(), value.clone());
                }
            }
        }
        MemoryEvent::InsightShared {
            participant_id,
            insight,
            context,
        } => {
            if let Some(list) = ensure_array(data, "shared_insights") {
                list.push(serde_json::json!({
                    "timestamp": now,
                    "participant_id": participant_id,
                    "insight": insight,
                    "context": context,
                }));
            }
        }
    }
}

fn ensure_array<'a>(
    data: &'a mut serde_json::Value,
    key: &str,
) -> Option<&'a mut Vec<serde_json::Value>> {
    data.as_object_mut()
        .map(|root| root.entry(key).or_insert(serde_json::json!([])))
        .and_then(|v| v.as_array_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockStore {
        documents: Mutex<HashMap<String, CommunalDocument>>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                documents: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl MemoryStore for MockStore {
        async fn get_document(
            &self,
            handle: &str,
            _requesting_user_id: &str,
        ) -> Result<Option<CommunalDocument>> {
            Ok(self.documents.lock().unwrap().get(handle).cloned())
        }

        async fn put_document(
            &self,
            handle: &str,
            data: serde_json::Value,
            _requesting_user_id: &str,
        ) -> Result<()> {
            self.documents.lock().unwrap().insert(
                handle.to_string(),
                CommunalDocument {
                    data,
                    updated_at: chrono::Utc::now().to_rfc3339(),
                },
            );
            Ok(())
        }
    }

    struct UnreachableStore;

    #[async_trait]
    impl MemoryStore for UnreachableStore {
        async fn get_document(
            &self,
            _handle: &str,
            _requesting_user_id: &str,
        ) -> Result<Option<CommunalDocument>> {
            Err(CoreError::vault_integration(
                "store unreachable",
                ErrorContext::new("get_document"),
            ))
        }

        async fn put_document(
            &self,
            _handle: &str,
            _data: serde_json::Value,
            _requesting_user_id: &str,
        ) -> Result<()> {
            Err(CoreError::vault_integration(
                "store unreachable",
                ErrorContext::new("put_document"),
            ))
        }
    }

    fn session_with_handle(store: &MockStore) -> Session {
        let mut session = Session::new("owner", "topic");
        let handle = format!("session-{}", session.id);
        store.documents.lock().unwrap().insert(
            handle.clone(),
            CommunalDocument::seed(&session.id, &session.topic),
        );
        session.communal_memory_id = Some(handle);
        session
    }

    #[tokio::test]
    async fn initialize_seeds_the_document() {
        let store = Arc::new(MockStore::new());
        let mediator = CommunalMemoryMediator::new(store.clone());

        let handle = mediator
            .initialize_session("room-1", "Sprint Planning", "owner")
            .await
            .unwrap();
        assert_eq!(handle, "session-room-1");

        let doc = store.documents.lock().unwrap().get(&handle).cloned().unwrap();
        assert_eq!(doc.data["topic"], serde_json::json!("Sprint Planning"));
        assert!(doc.data["participants"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn join_leave_and_insight_mutate_the_document() {
        let store = Arc::new(MockStore::new());
        let mediator = CommunalMemoryMediator::new(store.clone());
        let session = session_with_handle(&store);

        mediator
            .apply_event(
                &session,
                MemoryEvent::ParticipantAdded {
                    participant_id: "alden".to_string(),
                    name: "Alden".to_string(),
                    role: Some("facilitator".to_string()),
                },
            )
            .await
            .unwrap();

        mediator
            .apply_event(
                &session,
                MemoryEvent::InsightShared {
                    participant_id: "alden".to_string(),
                    insight: "ship it".to_string(),
                    context: serde_json::Map::new(),
                },
            )
            .await
            .unwrap();

        mediator
            .apply_event(
                &session,
                MemoryEvent::ParticipantRemoved {
                    participant_id: "alden".to_string(),
                },
            )
            .await
            .unwrap();

        let handle = session.communal_memory_id.as_deref().unwrap();
        let doc = store.documents.lock().unwrap().get(handle).cloned().unwrap();
        let participants = doc.data["participants"].as_array().unwrap();
        assert_eq!(participants.len(), 1);
        assert!(participants[0].get("left_at").is_some());
        assert_eq!(doc.data["shared_insights"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn context_update_merges_keys() {
        let store = Arc::new(MockStore::new());
        let mediator = CommunalMemoryMediator::new(store.clone());
        let session = session_with_handle(&store);

        let mut first = serde_json::Map::new();
        first.insert("phase".to_string(), serde_json::json!("planning"));
        mediator
            .apply_event(&session, MemoryEvent::ContextUpdate { context: first })
            .await
            .unwrap();

        let mut second = serde_json::Map::new();
        second.insert("phase".to_string(), serde_json::json!("review"));
        second.insert("sprint".to_string(), serde_json::json!(4));
        mediator
            .apply_event(&session, MemoryEvent::ContextUpdate { context: second })
            .await
            .unwrap();

        let handle = session.communal_memory_id.as_deref().unwrap();
        let doc = store.documents.lock().unwrap().get(handle).cloned().unwrap();
        assert_eq!(doc.data["context"]["phase"], serde_json::json!("review"));
        assert_eq!(doc.data["context"]["sprint"], serde_json::json!(4));
    }

    #[tokio::test]
    async fn missing_handle_is_a_communal_memory_error() {
        let store = Arc::new(MockStore::new());
        let mediator = CommunalMemoryMediator::new(store);
        let session = Session::new("owner", "topic");

        let err = mediator
            .apply_event(
                &session,
                MemoryEvent::ParticipantRemoved {
                    participant_id: "alden".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::CommunalMemory);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_vault_integration() {
        let mediator = CommunalMemoryMediator::new(Arc::new(UnreachableStore));
        let mut session = Session::new("owner", "topic");
        session.communal_memory_id = Some("session-x".to_string());

        let err = mediator
            .apply_event(
                &session,
                MemoryEvent::ContextUpdate {
                    context: serde_json::Map::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::VaultIntegration);
    }
}
