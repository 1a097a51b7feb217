//! Breakout room model.

use super::event::SessionEvent;
use serde::{Deserialize, Serialize};

/// A bounded sub-group of a session's active participants.
///
/// Rooms keep their own nested event log. A room is open while `ended_at`
/// is unset; ended rooms are retained for audit, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutRoom {
    pub id: String,
    pub topic: String,
    pub parent_session_id: String,
    pub participant_ids: Vec<String>,
    /// Timestamp the room was created (ISO 8601 format).
    pub created_at: String,
    /// Timestamp the room was ended, if it has been (ISO 8601 format).
    #[serde(default)]
    pub ended_at: Option<String>,
    /// Side-conversation log, separate from the parent session log.
    #[serde(default)]
    pub events: Vec<SessionEvent>,
}

impl BreakoutRoom {
    pub fn new(
        parent_session_id: impl Into<String>,
        topic: impl Into<String>,
        participant_ids: Vec<String>,
    ) -> Self {
        let parent_session_id = parent_session_id.into();
        let id = format!(
            "{}-breakout-{}",
            parent_session_id,
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        Self {
            id,
            topic: topic.into(),
            parent_session_id,
            participant_ids,
            created_at: chrono::Utc::now().to_rfc3339(),
            ended_at: None,
            events: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Marks the room ended. Ending an already-ended room is a no-op.
    pub fn end(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(chrono::Utc::now().to_rfc3339());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_derived_from_parent() {
        let room = BreakoutRoom::new("room-abc", "Ethics", vec!["alice".to_string()]);
        assert!(room.id.starts_with("room-abc-breakout-"));
        assert!(room.is_open());
    }

    #[test]
    fn end_is_idempotent() {
        let mut room = BreakoutRoom::new("room-abc", "Ethics", vec![]);
        room.end();
        let first = room.ended_at.clone();
        room.end();
        assert_eq!(room.ended_at, first);
        assert!(!room.is_open());
    }
}
