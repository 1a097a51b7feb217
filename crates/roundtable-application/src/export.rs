//! Deterministic session log export.

use roundtable_core::session::{
    AuditRecord, BreakoutRoom, Participant, Session, SessionEvent, SessionStatus,
};
use serde::{Deserialize, Serialize};

/// A complete, self-contained export of a session's log.
///
/// Building an export is a pure read: it mutates nothing and carries no
/// export-time timestamp, so exporting the same unchanged session twice
/// yields byte-identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub session_id: String,
    pub topic: String,
    pub created_by: String,
    pub created_at: String,
    pub status: SessionStatus,
    pub exported_by: String,
    pub participants: Vec<Participant>,
    pub turn_order: Vec<String>,
    #[serde(default)]
    pub current_turn: Option<String>,
    /// Event log, minus hidden entries unless `include_hidden` was set.
    pub events: Vec<SessionEvent>,
    pub breakouts: Vec<BreakoutRoom>,
    pub audit_log: Vec<AuditRecord>,
}

impl SessionExport {
    /// Builds an export snapshot from a session.
    ///
    /// Unless `include_hidden` is set, events listed in
    /// `live_feed.hidden_event_ids` are omitted; everything else is carried
    /// verbatim, including soft-removed participants and ended breakout
    /// rooms.
    pub fn build(session: &Session, exported_by: &str, include_hidden: bool) -> Self {
        let hidden = &session.live_feed.hidden_event_ids;
        Self {
            session_id: session.id.clone(),
            topic: session.topic.clone(),
            created_by: session.created_by.clone(),
            created_at: session.created_at.clone(),
            status: session.status,
            exported_by: exported_by.to_string(),
            participants: session.participants.clone(),
            turn_order: session.turn_order.clone(),
            current_turn: session.current_turn.clone(),
            events: session
                .events
                .iter()
                .filter(|e| include_hidden || !hidden.contains(&e.id))
                .cloned()
                .collect(),
            breakouts: session.breakouts.clone(),
            audit_log: session.audit_log.clone(),
        }
    }

    /// Serializes the export as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_core::session::{EventKind, Session};

    #[test]
    fn export_is_deterministic_for_an_unchanged_session() {
        let mut session = Session::new("owner", "Sprint Planning");
        session.push_event(roundtable_core::session::SessionEvent::new(
            EventKind::SessionCreated,
        ));

        let first = SessionExport::build(&session, "owner", false).to_json().unwrap();
        let second = SessionExport::build(&session, "owner", false).to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn hidden_events_are_omitted_unless_requested() {
        let mut session = Session::new("owner", "t");
        let visible = roundtable_core::session::SessionEvent::new(EventKind::Join);
        let hidden = roundtable_core::session::SessionEvent::new(EventKind::Join);
        session.live_feed.hidden_event_ids.push(hidden.id.clone());
        session.push_event(visible.clone());
        session.push_event(hidden);

        let export = SessionExport::build(&session, "owner", false);
        assert_eq!(export.events.len(), 1);
        assert_eq!(export.events[0].id, visible.id);

        let export = SessionExport::build(&session, "owner", true);
        assert_eq!(export.events.len(), 2);
    }
}
