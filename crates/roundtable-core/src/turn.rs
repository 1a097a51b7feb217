//! Turn-taking scheduler.
//!
//! A small per-session state machine: `NotStarted -> Running -> Complete`.
//! Scheduler state is ephemeral and reconstructable; it is not part of the
//! persisted session. Timeouts are advisory metadata for a host-level
//! reaper; the scheduler starts no timers of its own.

use crate::config::CoreConfig;
use crate::error::{CoreError, ErrorContext, Result};
use crate::session::{EventKind, Session, SessionEvent};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Ephemeral per-session scheduler state.
#[derive(Debug, Clone)]
pub struct TurnState {
    /// Index of `current_turn` within the session's `turn_order`.
    pub current_index: usize,
    /// When the current turn began.
    pub turn_started_at: DateTime<Utc>,
    /// Advisory timeout in seconds; enforcement is the host's job.
    pub turn_timeout_secs: u64,
    /// Advisory auto-advance flag for the host.
    pub auto_advance: bool,
}

/// Outcome of an `advance_turn` call.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnAdvance {
    /// The participant whose turn just ended, if any.
    pub departed: Option<String>,
    /// The new current participant; `None` means the sequence completed,
    /// which is a valid non-error state.
    pub next: Option<String>,
    /// Elapsed seconds of the departed turn.
    pub elapsed_secs: f64,
}

/// Owns turn order and current-speaker state for every session.
#[derive(Debug, Default)]
pub struct TurnScheduler {
    states: HashMap<String, TurnState>,
}

impl TurnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts turn-taking in a session.
    ///
    /// With an explicit `turn_order`, every id must name a currently active
    /// participant. Without one, the default order is the join order of
    /// active participants. An empty order is valid: `current_turn` stays
    /// unset.
    pub fn start(
        &mut self,
        session: &mut Session,
        turn_order: Option<Vec<String>>,
        config: &CoreConfig,
    ) -> Result<()> {
        let active = session.active_participant_ids();
        let order = match turn_order {
            Some(order) => {
                if let Some(unknown) = order.iter().find(|id| !active.contains(id)) {
                    return Err(CoreError::invalid_operation(
                        "start_turn_taking",
                        format!("'{unknown}' is not an active participant"),
                        ErrorContext::new("start_turn_taking")
                            .with_session(&session.id)
                            .with_participant(unknown.clone()),
                    ));
                }
                order
            }
            None => active,
        };

        session.turn_order = order;
        session.current_turn = session.turn_order.first().cloned();

        self.states.insert(
            session.id.clone(),
            TurnState {
                current_index: 0,
                turn_started_at: Utc::now(),
                turn_timeout_secs: config.turn_timeout_secs,
                auto_advance: config.auto_advance,
            },
        );

        if let Some(first) = session.current_turn.clone() {
            session.push_event(SessionEvent::new(EventKind::TurnStart).with_participant(first));
        }

        Ok(())
    }

    /// Advances to the next participant in the order.
    ///
    /// Appends a `turn_complete` event for the departing participant and a
    /// `turn_start` event for the new one. Running off the end of the order
    /// completes the sequence: `current_turn` clears and `next` is `None`.
    pub fn advance(&mut self, session: &mut Session) -> Result<TurnAdvance> {
        let state = self.states.get_mut(&session.id).ok_or_else(|| {
            CoreError::turn_taking(
                "turn-taking not started",
                ErrorContext::new("advance_turn").with_session(&session.id),
            )
        })?;

        let now = Utc::now();
        let elapsed_secs = (now - state.turn_started_at)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;

        let departed = session.current_turn.clone();
        if let Some(id) = &departed {
            session.push_event(
                SessionEvent::new(EventKind::TurnComplete).with_participant(id.clone()),
            );
        }

        let next_index = state.current_index + 1;
        if next_index < session.turn_order.len() {
            state.current_index = next_index;
            state.turn_started_at = now;
            let next = session.turn_order[next_index].clone();
            session.current_turn = Some(next.clone());
            session.push_event(
                SessionEvent::new(EventKind::TurnStart).with_participant(next.clone()),
            );
            Ok(TurnAdvance {
                departed,
                next: Some(next),
                elapsed_secs,
            })
        } else {
            // Sequence complete. Not an error.
            session.current_turn = None;
            Ok(TurnAdvance {
                departed,
                next: None,
                elapsed_secs,
            })
        }
    }

    /// Manually overrides the current turn, bypassing normal ordering.
    ///
    /// The participant must be active. If it appears in `turn_order`, the
    /// scheduler index re-syncs to its position; otherwise it is appended
    /// to the order so `current_turn` always names a member of it. Appends
    /// a `turn_set` event carrying the previous turn for audit.
    pub fn set_current(&mut self, session: &mut Session, participant_id: &str) -> Result<()> {
        if session.find_active_participant(participant_id).is_none() {
            return Err(CoreError::participant_not_found(
                participant_id,
                &session.id,
                ErrorContext::new("set_current_turn")
                    .with_session(&session.id)
                    .with_participant(participant_id),
            ));
        }

        let index = match session.turn_order.iter().position(|id| id == participant_id) {
            Some(index) => index,
            None => {
                session.turn_order.push(participant_id.to_string());
                session.turn_order.len() - 1
            }
        };
        if let Some(state) = self.states.get_mut(&session.id) {
            state.current_index = index;
            state.turn_started_at = Utc::now();
        }

        let previous = session.current_turn.replace(participant_id.to_string());
        session.push_event(
            SessionEvent::new(EventKind::TurnSet)
                .with_participant(participant_id)
                .with_metadata(
                    "previous_turn",
                    previous.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null),
                ),
        );

        Ok(())
    }

    /// Repairs scheduler and session state after a participant removal.
    ///
    /// Clears `current_turn` if the removed participant held the floor and
    /// re-syncs the index to wherever the current speaker now sits in the
    /// shrunk order.
    pub fn resync_after_removal(&mut self, session: &mut Session, removed_id: &str) {
        if session.current_turn.as_deref() == Some(removed_id) {
            session.current_turn = None;
        }
        if let Some(state) = self.states.get_mut(&session.id) {
            if let Some(current) = &session.current_turn {
                if let Some(index) = session.turn_order.iter().position(|id| id == current) {
                    state.current_index = index;
                }
            } else {
                state.current_index = state
                    .current_index
                    .min(session.turn_order.len().saturating_sub(1));
            }
        }
    }

    /// Discards scheduler state for a session (used when a session ends).
    pub fn clear(&mut self, session_id: &str) {
        self.states.remove(session_id);
    }

    /// Read access for host-level reapers polling turn age.
    pub fn state(&self, session_id: &str) -> Option<&TurnState> {
        self.states.get(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ParticipantKind, ParticipantSpec};

    fn session_with(ids: &[&str]) -> Session {
        let mut session = Session::new("owner", "topic");
        for (i, id) in ids.iter().enumerate() {
            session.participants.push(crate::session::Participant::from_spec(
                ParticipantSpec::new(*id, ParticipantKind::Persona, *id),
                i,
            ));
            session.turn_order.push(id.to_string());
        }
        session
    }

    #[test]
    fn default_order_is_join_order() {
        let mut session = session_with(&["alden", "alice"]);
        session.turn_order.clear();
        let mut scheduler = TurnScheduler::new();
        scheduler
            .start(&mut session, None, &CoreConfig::default())
            .unwrap();

        assert_eq!(session.turn_order, vec!["alden", "alice"]);
        assert_eq!(session.current_turn.as_deref(), Some("alden"));
        assert!(session.turn_invariants_hold());
    }

    #[test]
    fn explicit_order_must_name_active_participants() {
        let mut session = session_with(&["alden"]);
        let mut scheduler = TurnScheduler::new();
        let err = scheduler
            .start(
                &mut session,
                Some(vec!["ghost".to_string()]),
                &CoreConfig::default(),
            )
            .unwrap_err();
        assert!(err.is_invalid_operation());
    }

    #[test]
    fn empty_order_is_a_valid_state() {
        let mut session = Session::new("owner", "topic");
        let mut scheduler = TurnScheduler::new();
        scheduler
            .start(&mut session, None, &CoreConfig::default())
            .unwrap();
        assert!(session.current_turn.is_none());
        assert!(session.turn_invariants_hold());
    }

    #[test]
    fn advance_walks_the_order_once_then_completes() {
        let mut session = session_with(&["alden", "alice"]);
        session.turn_order.clear();
        let mut scheduler = TurnScheduler::new();
        scheduler
            .start(&mut session, None, &CoreConfig::default())
            .unwrap();

        let step = scheduler.advance(&mut session).unwrap();
        assert_eq!(step.departed.as_deref(), Some("alden"));
        assert_eq!(step.next.as_deref(), Some("alice"));

        let step = scheduler.advance(&mut session).unwrap();
        assert_eq!(step.departed.as_deref(), Some("alice"));
        assert_eq!(step.next, None);
        assert!(session.current_turn.is_none());
        assert!(session.turn_invariants_hold());
    }

    #[test]
    fn advance_before_start_fails() {
        let mut session = session_with(&["alden"]);
        let mut scheduler = TurnScheduler::new();
        let err = scheduler.advance(&mut session).unwrap_err();
        assert_eq!(
            err.category(),
            crate::error::ErrorCategory::TurnTaking
        );
    }

    #[test]
    fn set_current_resyncs_index_and_records_previous() {
        let mut session = session_with(&["alden", "alice", "bea"]);
        let mut scheduler = TurnScheduler::new();
        scheduler
            .start(&mut session, None, &CoreConfig::default())
            .unwrap();

        scheduler.set_current(&mut session, "bea").unwrap();
        assert_eq!(session.current_turn.as_deref(), Some("bea"));
        assert_eq!(scheduler.state(&session.id).unwrap().current_index, 2);

        let event = session.events.last().unwrap();
        assert_eq!(event.kind, EventKind::TurnSet);
        assert_eq!(
            event.metadata["previous_turn"],
            serde_json::json!("alden")
        );

        // Advancing from the override continues past the end.
        let step = scheduler.advance(&mut session).unwrap();
        assert_eq!(step.next, None);
    }

    #[test]
    fn set_current_appends_unlisted_participants_to_the_order() {
        let mut session = session_with(&["alden", "alice"]);
        session.turn_order.clear();
        let mut scheduler = TurnScheduler::new();
        scheduler
            .start(
                &mut session,
                Some(vec!["alden".to_string()]),
                &CoreConfig::default(),
            )
            .unwrap();

        scheduler.set_current(&mut session, "alice").unwrap();
        assert_eq!(session.current_turn.as_deref(), Some("alice"));
        assert_eq!(session.turn_order, vec!["alden", "alice"]);
        assert!(session.turn_invariants_hold());
    }

    #[test]
    fn set_current_rejects_inactive_participant() {
        let mut session = session_with(&["alden", "alice"]);
        session.find_active_participant_mut("alice").unwrap().deactivate();
        session.turn_order.retain(|id| id != "alice");

        let mut scheduler = TurnScheduler::new();
        scheduler
            .start(&mut session, None, &CoreConfig::default())
            .unwrap();
        let err = scheduler.set_current(&mut session, "alice").unwrap_err();
        assert!(err.is_participant_not_found());
    }

    #[test]
    fn resync_clears_turn_of_removed_holder() {
        let mut session = session_with(&["alden", "alice"]);
        let mut scheduler = TurnScheduler::new();
        scheduler
            .start(&mut session, None, &CoreConfig::default())
            .unwrap();

        // Soft-remove the current speaker.
        session.find_active_participant_mut("alden").unwrap().deactivate();
        session.turn_order.retain(|id| id != "alden");
        scheduler.resync_after_removal(&mut session, "alden");

        assert!(session.current_turn.is_none());
        assert!(session.turn_invariants_hold());
    }
}
