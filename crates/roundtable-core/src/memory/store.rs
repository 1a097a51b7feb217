//! External communal-memory store contract.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A communal memory document as stored externally.
///
/// The engine treats `data` as an opaque JSON map carrying at least the
/// keys `participants`, `context`, and `shared_insights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunalDocument {
    pub data: serde_json::Value,
    /// Timestamp of the last write (ISO 8601 format).
    pub updated_at: String,
}

impl CommunalDocument {
    /// Seed document for a freshly created session.
    pub fn seed(session_id: &str, topic: &str) -> Self {
        Self {
            data: serde_json::json!({
                "session_id": session_id,
                "topic": topic,
                "created_at": chrono::Utc::now().to_rfc3339(),
                "participants": [],
                "context": {},
                "shared_insights": [],
            }),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Contract the engine requires from the external memory store.
///
/// Calls are short synchronous-style operations bounded by the caller's
/// request lifetime; no cancellation token is propagated and the engine
/// performs no retries of its own.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetches a document by handle, or `None` if the handle is unknown.
    async fn get_document(
        &self,
        handle: &str,
        requesting_user_id: &str,
    ) -> Result<Option<CommunalDocument>>;

    /// Writes a whole document. Last writer wins; there is no field-level
    /// merge.
    async fn put_document(
        &self,
        handle: &str,
        data: serde_json::Value,
        requesting_user_id: &str,
    ) -> Result<()>;
}
