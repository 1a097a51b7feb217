//! Session domain model.
//!
//! This module contains the core `Session` aggregate that the orchestration
//! engine operates on. The registry owns every `Session` exclusively; the
//! scheduler, breakout manager, and mediator only borrow it for the
//! duration of a single operation.

use super::breakout::BreakoutRoom;
use super::event::SessionEvent;
use super::participant::Participant;
use serde::{Deserialize, Serialize};

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Ended,
    Archived,
}

/// Live feed verbosity levels for UI layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedVerbosity {
    Minimal,
    Default,
    Verbose,
}

/// Live feed configuration for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveFeedSettings {
    pub verbosity: FeedVerbosity,
    /// Event ids excluded from exports unless explicitly included.
    #[serde(default)]
    pub hidden_event_ids: Vec<String>,
    pub auto_include_external: bool,
    pub show_metadata: bool,
}

impl Default for LiveFeedSettings {
    fn default() -> Self {
        Self {
            verbosity: FeedVerbosity::Default,
            hidden_event_ids: Vec::new(),
            auto_include_external: true,
            show_metadata: false,
        }
    }
}

/// One raw operation record in a session's append-only audit log.
///
/// Audit records are also what the event bus fans out to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Timestamp of the operation (ISO 8601 format).
    pub timestamp: String,
    pub action: String,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    /// "success" or "error: ..." for failed operations.
    pub outcome: String,
}

impl AuditRecord {
    pub fn success(
        action: impl Into<String>,
        user_id: impl Into<String>,
        session_id: Option<String>,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            action: action.into(),
            user_id: user_id.into(),
            session_id,
            details,
            outcome: "success".to_string(),
        }
    }

    pub fn failure(
        action: impl Into<String>,
        user_id: impl Into<String>,
        session_id: Option<String>,
        details: serde_json::Map<String, serde_json::Value>,
        error: &crate::error::CoreError,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            action: action.into(),
            user_id: user_id.into(),
            session_id,
            details,
            outcome: format!("error: {error}"),
        }
    }
}

/// The session aggregate root.
///
/// Invariants:
/// - `current_turn`, when set, is an id present in `turn_order`
/// - `turn_order` is a subset of currently active participant ids
/// - `events` and `audit_log` are append-only
/// - once `status` is `Ended`, only reads are permitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_by: String,
    /// Timestamp the session was created (ISO 8601 format).
    pub created_at: String,
    pub topic: String,
    pub participants: Vec<Participant>,
    /// Append-only session event log.
    pub events: Vec<SessionEvent>,
    pub breakouts: Vec<BreakoutRoom>,
    pub live_feed: LiveFeedSettings,
    pub status: SessionStatus,
    /// The participant currently holding the floor, if any.
    #[serde(default)]
    pub current_turn: Option<String>,
    pub turn_order: Vec<String>,
    /// Opaque handle into the external communal memory store.
    #[serde(default)]
    pub communal_memory_id: Option<String>,
    /// Append-only audit log of raw operation records.
    pub audit_log: Vec<AuditRecord>,
}

impl Session {
    /// Creates an empty active session with a fresh `room-` id.
    pub fn new(created_by: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: format!("room-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            created_by: created_by.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            topic: topic.into(),
            participants: Vec::new(),
            events: Vec::new(),
            breakouts: Vec::new(),
            live_feed: LiveFeedSettings::default(),
            status: SessionStatus::Active,
            current_turn: None,
            turn_order: Vec::new(),
            communal_memory_id: None,
            audit_log: Vec::new(),
        }
    }

    /// Whether mutating operations are still permitted.
    pub fn is_mutable(&self) -> bool {
        !matches!(self.status, SessionStatus::Ended | SessionStatus::Archived)
    }

    /// Ids of currently active participants, in join order.
    pub fn active_participant_ids(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn find_participant(&self, participant_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == participant_id)
    }

    /// Finds a participant that is still active. Soft-removed participants
    /// physically remain in the list but are not returned here.
    pub fn find_active_participant(&self, participant_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.id == participant_id && p.is_active)
    }

    pub fn find_active_participant_mut(
        &mut self,
        participant_id: &str,
    ) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.id == participant_id && p.is_active)
    }

    pub fn find_open_breakout_mut(&mut self, breakout_id: &str) -> Option<&mut BreakoutRoom> {
        self.breakouts
            .iter_mut()
            .find(|b| b.id == breakout_id && b.is_open())
    }

    pub fn open_breakout_count(&self) -> usize {
        self.breakouts.iter().filter(|b| b.is_open()).count()
    }

    /// Appends an event to the session log.
    pub fn push_event(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    /// Checks the turn-taking invariants: `current_turn` is unset or a
    /// member of `turn_order`, and `turn_order` only names active
    /// participants.
    pub fn turn_invariants_hold(&self) -> bool {
        let active = self.active_participant_ids();
        let order_ok = self.turn_order.iter().all(|id| active.contains(id));
        let turn_ok = match &self.current_turn {
            Some(id) => self.turn_order.contains(id),
            None => true,
        };
        order_ok && turn_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::participant::{Participant, ParticipantKind, ParticipantSpec};

    fn participant(id: &str, position: usize) -> Participant {
        Participant::from_spec(
            ParticipantSpec::new(id, ParticipantKind::Persona, id),
            position,
        )
    }

    #[test]
    fn new_session_is_active_and_empty() {
        let session = Session::new("owner", "Sprint Planning");
        assert!(session.id.starts_with("room-"));
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.is_mutable());
        assert!(session.turn_invariants_hold());
    }

    #[test]
    fn ended_session_is_not_mutable() {
        let mut session = Session::new("owner", "t");
        session.status = SessionStatus::Ended;
        assert!(!session.is_mutable());
    }

    #[test]
    fn active_participant_lookup_skips_soft_removed() {
        let mut session = Session::new("owner", "t");
        session.participants.push(participant("alden", 0));
        session.participants.push(participant("alice", 1));
        session.participants[1].deactivate();

        assert!(session.find_active_participant("alden").is_some());
        assert!(session.find_active_participant("alice").is_none());
        // Record survives soft removal.
        assert!(session.find_participant("alice").is_some());
        assert_eq!(session.active_participant_ids(), vec!["alden"]);
    }

    #[test]
    fn turn_invariants_detect_violations() {
        let mut session = Session::new("owner", "t");
        session.participants.push(participant("alden", 0));
        session.turn_order = vec!["alden".to_string()];
        session.current_turn = Some("alden".to_string());
        assert!(session.turn_invariants_hold());

        session.current_turn = Some("ghost".to_string());
        assert!(!session.turn_invariants_hold());

        session.current_turn = None;
        session.turn_order.push("ghost".to_string());
        assert!(!session.turn_invariants_hold());
    }
}
