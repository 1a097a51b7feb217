//! Session event log entries.

use serde::{Deserialize, Serialize};

/// Closed set of session event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Join,
    Leave,
    TurnStart,
    TurnComplete,
    TurnSet,
    BreakoutCreate,
    BreakoutEnd,
    InsightShared,
    SessionCreated,
    SessionPaused,
    SessionResumed,
    SessionEnded,
}

/// An entry in a session's append-only event log.
///
/// Immutable once appended: the log is never rewritten or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: String,
    /// Timestamp the event occurred (ISO 8601 format).
    pub timestamp: String,
    pub kind: EventKind,
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SessionEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: format!("event-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
            participant_id: None,
            content: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_get_unique_prefixed_ids() {
        let a = SessionEvent::new(EventKind::Join);
        let b = SessionEvent::new(EventKind::Join);
        assert!(a.id.starts_with("event-"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&EventKind::TurnComplete).unwrap();
        assert_eq!(json, "\"turn_complete\"");
    }
}
