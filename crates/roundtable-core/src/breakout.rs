//! Breakout room management.

use crate::error::{CoreError, ErrorContext, Result};
use crate::session::{BreakoutRoom, EventKind, Session, SessionEvent};

/// Creates and ends bounded sub-groups of a session's active participants.
///
/// Breakout lifecycle events land on the parent session's log; the rooms
/// keep their own side-conversation logs.
#[derive(Debug, Default)]
pub struct BreakoutRoomManager;

impl BreakoutRoomManager {
    pub fn new() -> Self {
        Self
    }

    /// Creates a breakout room within a session.
    ///
    /// Every id in `participant_ids` must name an active participant of
    /// the parent session.
    pub fn create(
        &self,
        session: &mut Session,
        topic: &str,
        participant_ids: Vec<String>,
    ) -> Result<String> {
        let active = session.active_participant_ids();
        if let Some(unknown) = participant_ids.iter().find(|id| !active.contains(id)) {
            return Err(CoreError::invalid_operation(
                "create_breakout",
                format!("'{unknown}' is not an active participant of the parent session"),
                ErrorContext::new("create_breakout")
                    .with_session(&session.id)
                    .with_participant(unknown.clone()),
            ));
        }

        let room = BreakoutRoom::new(&session.id, topic, participant_ids.clone());
        let breakout_id = room.id.clone();
        session.breakouts.push(room);

        session.push_event(
            SessionEvent::new(EventKind::BreakoutCreate)
                .with_metadata("breakout_id", serde_json::json!(breakout_id))
                .with_metadata("topic", serde_json::json!(topic))
                .with_metadata("participants", serde_json::json!(participant_ids)),
        );

        Ok(breakout_id)
    }

    /// Ends an open breakout room.
    ///
    /// Fails if the id does not name a currently open room. The room
    /// record is retained for audit.
    pub fn end(&self, session: &mut Session, breakout_id: &str) -> Result<f64> {
        let session_id = session.id.clone();
        let room = session.find_open_breakout_mut(breakout_id).ok_or_else(|| {
            CoreError::breakout_room(
                format!("breakout '{breakout_id}' is not open"),
                ErrorContext::new("end_breakout").with_session(session_id),
            )
        })?;

        let created = chrono::DateTime::parse_from_rfc3339(&room.created_at)
            .map(|t| t.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now());
        room.end();
        let topic = room.topic.clone();
        let duration_secs = (chrono::Utc::now() - created).num_milliseconds().max(0) as f64 / 1000.0;

        session.push_event(
            SessionEvent::new(EventKind::BreakoutEnd)
                .with_metadata("breakout_id", serde_json::json!(breakout_id))
                .with_metadata("topic", serde_json::json!(topic)),
        );

        Ok(duration_secs)
    }

    /// Force-ends every open breakout (used when the parent session ends).
    /// Returns the ids of the rooms that were closed.
    pub fn end_all_open(&self, session: &mut Session) -> Vec<String> {
        let open_ids: Vec<String> = session
            .breakouts
            .iter()
            .filter(|b| b.is_open())
            .map(|b| b.id.clone())
            .collect();

        for id in &open_ids {
            if let Some(room) = session.find_open_breakout_mut(id) {
                room.end();
            }
            session.push_event(
                SessionEvent::new(EventKind::BreakoutEnd)
                    .with_metadata("breakout_id", serde_json::json!(id))
                    .with_metadata("forced", serde_json::json!(true)),
            );
        }

        open_ids
    }
}
