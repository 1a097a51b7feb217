//! Lightweight session projection for UI polling.

use super::model::{Session, SessionStatus};
use serde::{Deserialize, Serialize};

/// A dashboard-friendly projection of a session.
///
/// Produced by `get_session_summary`, which deliberately returns `None`
/// for unknown sessions instead of an error (dashboards poll
/// optimistically).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub topic: String,
    pub status: SessionStatus,
    pub participant_count: usize,
    #[serde(default)]
    pub current_turn: Option<String>,
    pub open_breakout_count: usize,
    pub event_count: usize,
    pub created_at: String,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            topic: session.topic.clone(),
            status: session.status,
            participant_count: session.active_participant_ids().len(),
            current_turn: session.current_turn.clone(),
            open_breakout_count: session.open_breakout_count(),
            event_count: session.events.len(),
            created_at: session.created_at.clone(),
        }
    }
}
