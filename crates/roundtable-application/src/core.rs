//! The orchestration facade.
//!
//! `Core` composes the session registry, turn scheduler, breakout manager,
//! communal memory mediator, metrics engine, error policy, and event bus
//! behind one API. The registry owns every session exclusively; all other
//! components borrow a session only for the duration of a single
//! operation.
//!
//! Lock order is fixed: sessions, then scheduler, then metrics, then
//! policy. Communal memory mediation runs after the session mutation has
//! been committed and is best-effort: a store failure is logged, metered,
//! and routed through the error policy, but never rolls back session
//! state.

use crate::export::SessionExport;
use roundtable_core::breakout::BreakoutRoomManager;
use roundtable_core::bus::{EventBus, EventSubscriber};
use roundtable_core::config::CoreConfig;
use roundtable_core::error::{CoreError, ErrorContext, Result};
use roundtable_core::memory::{CommunalMemoryMediator, MemoryEvent, MemoryStore};
use roundtable_core::metrics::{MetricKind, MetricsEngine, ParticipantStats, SessionStats};
use roundtable_core::policy::{ErrorPolicy, ErrorSummary};
use roundtable_core::session::{
    AuditRecord, EventKind, ParticipantSpec, Session, SessionEvent, SessionStatus, SessionSummary,
    Participant,
};
use roundtable_core::turn::TurnScheduler;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Central coordinator for multi-participant sessions.
pub struct Core {
    config: CoreConfig,
    sessions: RwLock<HashMap<String, Session>>,
    scheduler: Mutex<TurnScheduler>,
    breakouts: BreakoutRoomManager,
    mediator: CommunalMemoryMediator,
    metrics: Mutex<MetricsEngine>,
    policy: Mutex<ErrorPolicy>,
    bus: EventBus,
}

impl Core {
    pub fn new(config: CoreConfig, store: Arc<dyn MemoryStore>) -> Self {
        let metrics = Mutex::new(MetricsEngine::new(&config));
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            scheduler: Mutex::new(TurnScheduler::new()),
            breakouts: BreakoutRoomManager::new(),
            mediator: CommunalMemoryMediator::new(store),
            metrics,
            policy: Mutex::new(ErrorPolicy::new()),
            bus: EventBus::new(),
        }
    }

    // ============================================================================
    // Session lifecycle
    // ============================================================================

    /// Creates a new active session, seeds its communal memory, and adds
    /// any initial participants.
    ///
    /// `user_id` and `topic` must be non-blank. Memory seeding is
    /// best-effort: if the store is unreachable the session is still
    /// created, without a memory handle, and the failure is metered and
    /// logged. A malformed initial participant is also non-fatal to the
    /// create; it is audited and skipped.
    pub async fn create_session(
        &self,
        user_id: &str,
        topic: &str,
        initial_participants: Vec<ParticipantSpec>,
    ) -> Result<String> {
        let started = std::time::Instant::now();
        if user_id.trim().is_empty() {
            return self
                .finish(Err(CoreError::invalid_operation(
                    "create_session",
                    "user id must not be empty",
                    ErrorContext::new("create_session"),
                )))
                .await;
        }
        if topic.trim().is_empty() {
            return self
                .finish(Err(CoreError::invalid_operation(
                    "create_session",
                    "topic must not be empty",
                    ErrorContext::new("create_session").with_user(user_id),
                )))
                .await;
        }
        let mut session = Session::new(user_id, topic);
        let session_id = session.id.clone();

        match self
            .mediator
            .initialize_session(&session_id, topic, user_id)
            .await
        {
            Ok(handle) => {
                session.communal_memory_id = Some(handle);
                self.record(MetricKind::MemoryOps, &session_id, 1.0, "count", None)
                    .await;
            }
            Err(err) => self.handle_error(&err).await,
        }

        session.push_event(
            SessionEvent::new(EventKind::SessionCreated)
                .with_metadata("topic", serde_json::json!(topic)),
        );
        let record = AuditRecord::success(
            "create_session",
            user_id,
            Some(session_id.clone()),
            details([("topic", serde_json::json!(topic))]),
        );
        session.audit_log.push(record.clone());
        self.bus.publish(&record);

        self.sessions.write().await.insert(session_id.clone(), session);

        for spec in initial_participants {
            if let Err(err) = self.add_participant(&session_id, spec, user_id).await {
                tracing::warn!(
                    session_id = %session_id,
                    error = %err,
                    "skipping malformed initial participant"
                );
            }
        }

        self.record(
            MetricKind::ContextSwitchLatency,
            &session_id,
            started.elapsed().as_secs_f64(),
            "seconds",
            None,
        )
        .await;
        tracing::info!(session_id = %session_id, topic, "session created");
        Ok(session_id)
    }

    /// Returns a snapshot of a session.
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| not_found(session_id, "get_session"))
    }

    /// Ids of all sessions currently in the `Active` status.
    pub async fn get_active_sessions(&self) -> Vec<String> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Dashboard projection of a session.
    ///
    /// Returns `None` for unknown sessions rather than an error;
    /// dashboards poll optimistically and an absent session is not a
    /// fault.
    pub async fn get_session_summary(&self, session_id: &str) -> Option<SessionSummary> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(SessionSummary::from)
    }

    /// Pauses an active session. Paused sessions refuse turn operations
    /// and breakout creation until resumed; membership changes and
    /// insights remain allowed.
    pub async fn pause_session(&self, session_id: &str, user_id: &str) -> Result<()> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "pause_session")),
                Some(session) => {
                    let result = if session.status == SessionStatus::Active {
                        session.status = SessionStatus::Paused;
                        session.push_event(SessionEvent::new(EventKind::SessionPaused));
                        Ok(())
                    } else {
                        Err(CoreError::invalid_operation(
                            "pause_session",
                            format!("session is {:?}, not active", session.status),
                            op_context("pause_session", session_id, user_id),
                        ))
                    };
                    self.audit(session, "pause_session", user_id, details([]), &result);
                    result
                }
            }
        };
        self.finish(outcome).await
    }

    /// Resumes a paused session.
    pub async fn resume_session(&self, session_id: &str, user_id: &str) -> Result<()> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "resume_session")),
                Some(session) => {
                    let result = if session.status == SessionStatus::Paused {
                        session.status = SessionStatus::Active;
                        session.push_event(SessionEvent::new(EventKind::SessionResumed));
                        Ok(())
                    } else {
                        Err(CoreError::invalid_operation(
                            "resume_session",
                            format!("session is {:?}, not paused", session.status),
                            op_context("resume_session", session_id, user_id),
                        ))
                    };
                    self.audit(session, "resume_session", user_id, details([]), &result);
                    result
                }
            }
        };
        self.finish(outcome).await
    }

    /// Ends a session: force-closes every open breakout, discards
    /// scheduler state, and freezes the session for reads only.
    pub async fn end_session(&self, session_id: &str, user_id: &str) -> Result<()> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "end_session")),
                Some(session) => {
                    let result = if session.is_mutable() {
                        let closed = self.breakouts.end_all_open(session);
                        session.current_turn = None;
                        session.status = SessionStatus::Ended;
                        session.push_event(
                            SessionEvent::new(EventKind::SessionEnded)
                                .with_metadata("closed_breakouts", serde_json::json!(closed)),
                        );
                        Ok(())
                    } else {
                        Err(CoreError::invalid_operation(
                            "end_session",
                            "session is already ended",
                            op_context("end_session", session_id, user_id),
                        ))
                    };
                    self.audit(session, "end_session", user_id, details([]), &result);
                    result.map(|_| session_age_secs(session))
                }
            }
        };

        match outcome {
            Ok(duration_secs) => {
                self.scheduler.lock().await.clear(session_id);
                self.record(
                    MetricKind::SessionDuration,
                    session_id,
                    duration_secs,
                    "seconds",
                    None,
                )
                .await;
                tracing::info!(session_id, "session ended");
                Ok(())
            }
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }

    // ============================================================================
    // Participants
    // ============================================================================

    /// Adds a participant to a mutable session.
    ///
    /// Ids are caller-supplied and must be unique among active
    /// participants; re-adding the id of a soft-removed participant is
    /// permitted and creates a fresh record.
    pub async fn add_participant(
        &self,
        session_id: &str,
        spec: ParticipantSpec,
        user_id: &str,
    ) -> Result<()> {
        let spec_id = spec.id.clone();
        let outcome = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "add_participant")),
                Some(session) => {
                    let context = op_context("add_participant", session_id, user_id)
                        .with_participant(&spec_id);
                    let result = spec
                        .validate(context.clone())
                        .and_then(|_| require_mutable(session, "add_participant", &context));
                    let result = result.and_then(|_| {
                        if session.find_active_participant(&spec_id).is_some() {
                            return Err(CoreError::invalid_operation(
                                "add_participant",
                                format!("participant '{spec_id}' is already active"),
                                context.clone(),
                            ));
                        }
                        let position = session.participants.len();
                        let participant = Participant::from_spec(spec.clone(), position);
                        session.push_event(
                            SessionEvent::new(EventKind::Join)
                                .with_participant(&participant.id),
                        );
                        if !session.turn_order.contains(&participant.id) {
                            session.turn_order.push(participant.id.clone());
                        }
                        session.participants.push(participant);
                        Ok(())
                    });
                    self.audit(
                        session,
                        "add_participant",
                        user_id,
                        details([("participant_id", serde_json::json!(spec_id))]),
                        &result,
                    );
                    result.map(|_| session.clone())
                }
            }
        };

        match outcome {
            Ok(snapshot) => {
                let participant = snapshot
                    .find_active_participant(&spec_id)
                    .cloned();
                if let Some(p) = participant {
                    self.mediate(
                        &snapshot,
                        MemoryEvent::ParticipantAdded {
                            participant_id: p.id,
                            name: p.name,
                            role: p.role,
                        },
                    )
                    .await;
                }
                Ok(())
            }
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }

    /// Soft-removes an active participant.
    ///
    /// The record is retained with `left_at` set. The id is pulled out of
    /// the turn order, and if the participant held the current turn it is
    /// cleared. Removing an already-removed participant fails.
    pub async fn remove_participant(
        &self,
        session_id: &str,
        participant_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            let mut scheduler = self.scheduler.lock().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "remove_participant")),
                Some(session) => {
                    let context = op_context("remove_participant", session_id, user_id)
                        .with_participant(participant_id);
                    let result = require_mutable(session, "remove_participant", &context)
                        .and_then(|_| {
                            match session.find_active_participant_mut(participant_id) {
                                None => Err(CoreError::participant_not_found(
                                    participant_id,
                                    session_id,
                                    context.clone(),
                                )),
                                Some(participant) => {
                                    participant.deactivate();
                                    Ok(())
                                }
                            }
                        });
                    if result.is_ok() {
                        session.turn_order.retain(|id| id != participant_id);
                        scheduler.resync_after_removal(session, participant_id);
                        session.push_event(
                            SessionEvent::new(EventKind::Leave)
                                .with_participant(participant_id),
                        );
                    }
                    self.audit(
                        session,
                        "remove_participant",
                        user_id,
                        details([("participant_id", serde_json::json!(participant_id))]),
                        &result,
                    );
                    result.map(|_| session.clone())
                }
            }
        };

        match outcome {
            Ok(snapshot) => {
                self.mediate(
                    &snapshot,
                    MemoryEvent::ParticipantRemoved {
                        participant_id: participant_id.to_string(),
                    },
                )
                .await;
                Ok(())
            }
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }

    // ============================================================================
    // Turn-taking
    // ============================================================================

    /// Starts turn-taking, optionally with an explicit order.
    pub async fn start_turn_taking(
        &self,
        session_id: &str,
        turn_order: Option<Vec<String>>,
        user_id: &str,
    ) -> Result<()> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            let mut scheduler = self.scheduler.lock().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "start_turn_taking")),
                Some(session) => {
                    let context = op_context("start_turn_taking", session_id, user_id);
                    let result = require_active(session, "start_turn_taking", &context)
                        .and_then(|_| scheduler.start(session, turn_order, &self.config));
                    let turn_order_details =
                        details([("turn_order", serde_json::json!(session.turn_order))]);
                    self.audit(session, "start_turn_taking", user_id, turn_order_details, &result);
                    result
                }
            }
        };
        self.finish(outcome).await
    }

    /// Advances to the next turn.
    ///
    /// Returns the new current participant, or `None` when the sequence
    /// completed. The departed turn's duration is recorded as a metric.
    pub async fn advance_turn(&self, session_id: &str, user_id: &str) -> Result<Option<String>> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            let mut scheduler = self.scheduler.lock().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "advance_turn")),
                Some(session) => {
                    let context = op_context("advance_turn", session_id, user_id);
                    let result = require_active(session, "advance_turn", &context)
                        .and_then(|_| scheduler.advance(session));
                    self.audit(
                        session,
                        "advance_turn",
                        user_id,
                        details([]),
                        &result.as_ref().map(|_| ()).map_err(Clone::clone),
                    );
                    result
                }
            }
        };

        match outcome {
            Ok(step) => {
                if let Some(departed) = &step.departed {
                    self.metrics.lock().await.record_metric(
                        MetricKind::TurnDuration,
                        session_id,
                        step.elapsed_secs,
                        "seconds",
                        Some(departed),
                        None,
                        vec![],
                    );
                }
                Ok(step.next)
            }
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }

    /// Manually sets the current turn, bypassing the normal order.
    pub async fn set_current_turn(
        &self,
        session_id: &str,
        participant_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let started = std::time::Instant::now();
        let outcome = {
            let mut sessions = self.sessions.write().await;
            let mut scheduler = self.scheduler.lock().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "set_current_turn")),
                Some(session) => {
                    let context = op_context("set_current_turn", session_id, user_id)
                        .with_participant(participant_id);
                    let result = require_active(session, "set_current_turn", &context)
                        .and_then(|_| scheduler.set_current(session, participant_id));
                    self.audit(
                        session,
                        "set_current_turn",
                        user_id,
                        details([("participant_id", serde_json::json!(participant_id))]),
                        &result,
                    );
                    result
                }
            }
        };

        match outcome {
            Ok(()) => {
                self.record(
                    MetricKind::ContextSwitchLatency,
                    session_id,
                    started.elapsed().as_secs_f64(),
                    "seconds",
                    Some(participant_id),
                )
                .await;
                Ok(())
            }
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }

    // ============================================================================
    // Breakout rooms
    // ============================================================================

    /// Creates a breakout room within a running session.
    pub async fn create_breakout(
        &self,
        session_id: &str,
        topic: &str,
        participant_ids: Vec<String>,
        user_id: &str,
    ) -> Result<String> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "create_breakout")),
                Some(session) => {
                    let context = op_context("create_breakout", session_id, user_id);
                    let result = require_active(session, "create_breakout", &context)
                        .and_then(|_| {
                            self.breakouts
                                .create(session, topic, participant_ids.clone())
                        });
                    self.audit(
                        session,
                        "create_breakout",
                        user_id,
                        details([("topic", serde_json::json!(topic))]),
                        &result.as_ref().map(|_| ()).map_err(Clone::clone),
                    );
                    result
                }
            }
        };
        self.finish(outcome).await
    }

    /// Ends a breakout room and returns its duration in seconds.
    pub async fn end_breakout(
        &self,
        session_id: &str,
        breakout_id: &str,
        user_id: &str,
    ) -> Result<f64> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "end_breakout")),
                Some(session) => {
                    let context = op_context("end_breakout", session_id, user_id);
                    let result = require_mutable(session, "end_breakout", &context)
                        .and_then(|_| self.breakouts.end(session, breakout_id));
                    self.audit(
                        session,
                        "end_breakout",
                        user_id,
                        details([("breakout_id", serde_json::json!(breakout_id))]),
                        &result.as_ref().map(|_| ()).map_err(Clone::clone),
                    );
                    result
                }
            }
        };

        match outcome {
            Ok(duration_secs) => {
                self.record(
                    MetricKind::BreakoutEfficiency,
                    session_id,
                    duration_secs,
                    "seconds",
                    None,
                )
                .await;
                Ok(duration_secs)
            }
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }

    // ============================================================================
    // Communal memory
    // ============================================================================

    /// Records an insight from an active participant on the session log
    /// and shares it into communal memory (best-effort).
    pub async fn share_insight(
        &self,
        session_id: &str,
        participant_id: &str,
        insight: &str,
        context_data: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let outcome = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                None => Err(not_found(session_id, "share_insight")),
                Some(session) => {
                    let context = op_context("share_insight", session_id, participant_id)
                        .with_participant(participant_id);
                    let result = require_mutable(session, "share_insight", &context)
                        .and_then(|_| {
                            if session.find_active_participant(participant_id).is_none() {
                                return Err(CoreError::participant_not_found(
                                    participant_id,
                                    session_id,
                                    context.clone(),
                                ));
                            }
                            session.push_event(
                                SessionEvent::new(EventKind::InsightShared)
                                    .with_participant(participant_id)
                                    .with_content(insight),
                            );
                            Ok(())
                        });
                    self.audit(
                        session,
                        "share_insight",
                        participant_id,
                        details([("participant_id", serde_json::json!(participant_id))]),
                        &result,
                    );
                    result.map(|_| session.clone())
                }
            }
        };

        match outcome {
            Ok(snapshot) => {
                self.record(
                    MetricKind::MessageVolume,
                    session_id,
                    1.0,
                    "messages",
                    Some(participant_id),
                )
                .await;
                self.mediate(
                    &snapshot,
                    MemoryEvent::InsightShared {
                        participant_id: participant_id.to_string(),
                        insight: insight.to_string(),
                        context: context_data,
                    },
                )
                .await;
                Ok(())
            }
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }

    /// Merges keys into the session's communal context.
    ///
    /// Unlike the other memory mutations this has no session-side effect,
    /// so a store failure here propagates to the caller.
    pub async fn update_context(
        &self,
        session_id: &str,
        context_data: serde_json::Map<String, serde_json::Value>,
        user_id: &str,
    ) -> Result<()> {
        let snapshot = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                None => Err(not_found(session_id, "update_context")),
                Some(session) if !session.is_mutable() => Err(CoreError::invalid_operation(
                    "update_context",
                    "session is ended",
                    op_context("update_context", session_id, user_id),
                )),
                Some(session) => Ok(session.clone()),
            }
        };

        let result = match snapshot {
            Ok(snapshot) => {
                self.mediator
                    .apply_event(
                        &snapshot,
                        MemoryEvent::ContextUpdate {
                            context: context_data,
                        },
                    )
                    .await
            }
            Err(err) => Err(err),
        };

        {
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(session_id) {
                self.audit(session, "update_context", user_id, details([]), &result);
            }
        }

        match result {
            Ok(()) => {
                self.record(MetricKind::MemoryOps, session_id, 1.0, "count", None)
                    .await;
                Ok(())
            }
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }

    // ============================================================================
    // Export, callbacks, metrics
    // ============================================================================

    /// Exports a session's log as pretty-printed JSON.
    ///
    /// Pure read: exporting the same unchanged session twice yields
    /// byte-identical output.
    pub async fn export_session_log(
        &self,
        session_id: &str,
        user_id: &str,
        include_hidden: bool,
    ) -> Result<String> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| not_found(session_id, "export_session_log"))?;
        SessionExport::build(session, user_id, include_hidden)
            .to_json()
            .map_err(|e| {
                CoreError::invalid_operation(
                    "export_session_log",
                    e.to_string(),
                    op_context("export_session_log", session_id, user_id),
                )
            })
    }

    /// Registers a subscriber that receives every audit record published
    /// by any operation.
    pub fn register_event_callback(&self, subscriber: EventSubscriber) {
        self.bus.subscribe(subscriber);
    }

    /// Records how long a participant took to respond, in seconds.
    ///
    /// Hosts driving persona generation call this after each reply;
    /// response times feed the contribution and performance scores.
    pub async fn record_response_time(
        &self,
        session_id: &str,
        participant_id: &str,
        seconds: f64,
    ) -> Result<()> {
        let known = self.sessions.read().await.contains_key(session_id);
        if !known {
            return self
                .finish(Err(not_found(session_id, "record_response_time")))
                .await;
        }
        self.record(
            MetricKind::ResponseTime,
            session_id,
            seconds,
            "seconds",
            Some(participant_id),
        )
        .await;
        Ok(())
    }

    /// Purges raw metric entries older than the retention window.
    /// Aggregates and scores are unaffected.
    pub async fn cleanup_old_metrics(&self) -> usize {
        self.metrics.lock().await.cleanup_old_metrics()
    }

    pub async fn performance_score(&self, session_id: &str) -> f64 {
        self.metrics.lock().await.performance_score(session_id)
    }

    pub async fn contribution_score(&self, session_id: &str, participant_id: &str) -> f64 {
        self.metrics
            .lock()
            .await
            .contribution_score(session_id, participant_id)
    }

    pub async fn engagement_score(&self, session_id: &str, participant_id: &str) -> f64 {
        self.metrics
            .lock()
            .await
            .engagement_score(session_id, participant_id)
    }

    pub async fn session_stats(&self, session_id: &str) -> Option<SessionStats> {
        self.metrics.lock().await.session_stats(session_id).cloned()
    }

    pub async fn participant_stats(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Option<ParticipantStats> {
        self.metrics
            .lock()
            .await
            .participant_stats(session_id, participant_id)
            .cloned()
    }

    /// Error counts by category since startup.
    pub async fn error_summary(&self) -> ErrorSummary {
        self.policy.lock().await.error_summary()
    }

    // ============================================================================
    // Internals
    // ============================================================================

    /// Appends an audit record reflecting `result` to the session's log and
    /// fans it out on the event bus.
    fn audit(
        &self,
        session: &mut Session,
        action: &str,
        user_id: &str,
        details: serde_json::Map<String, serde_json::Value>,
        result: &Result<()>,
    ) {
        let record = match result {
            Ok(()) => {
                AuditRecord::success(action, user_id, Some(session.id.clone()), details)
            }
            Err(err) => {
                AuditRecord::failure(action, user_id, Some(session.id.clone()), details, err)
            }
        };
        session.audit_log.push(record.clone());
        self.bus.publish(&record);
    }

    /// Best-effort communal memory mediation: success is metered as a
    /// memory op, failure is routed through the error policy without
    /// touching session state.
    async fn mediate(&self, session: &Session, event: MemoryEvent) {
        match self.mediator.apply_event(session, event).await {
            Ok(()) => {
                self.record(MetricKind::MemoryOps, &session.id, 1.0, "count", None)
                    .await;
            }
            Err(err) => self.handle_error(&err).await,
        }
    }

    async fn record(
        &self,
        kind: MetricKind,
        session_id: &str,
        value: f64,
        unit: &str,
        participant_id: Option<&str>,
    ) {
        self.metrics.lock().await.record_metric(
            kind,
            session_id,
            value,
            unit,
            participant_id,
            None,
            vec![],
        );
    }

    async fn handle_error(&self, err: &CoreError) {
        let mut metrics = self.metrics.lock().await;
        self.policy.lock().await.handle(err, &mut metrics);
    }

    /// Routes an operation outcome through the error policy on failure.
    async fn finish<T>(&self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                self.handle_error(&err).await;
                Err(err)
            }
        }
    }
}

fn not_found(session_id: &str, operation: &str) -> CoreError {
    CoreError::session_not_found(
        session_id,
        ErrorContext::new(operation).with_session(session_id),
    )
}

fn op_context(operation: &str, session_id: &str, user_id: &str) -> ErrorContext {
    ErrorContext::new(operation)
        .with_session(session_id)
        .with_user(user_id)
}

fn require_mutable(session: &Session, operation: &str, context: &ErrorContext) -> Result<()> {
    if session.is_mutable() {
        Ok(())
    } else {
        Err(CoreError::invalid_operation(
            operation,
            format!("session is {:?}", session.status),
            context.clone(),
        ))
    }
}

/// Turn and breakout-creation operations require a running session, not
/// just a mutable one: a paused session refuses them until resumed.
fn require_active(session: &Session, operation: &str, context: &ErrorContext) -> Result<()> {
    if session.status == SessionStatus::Active {
        Ok(())
    } else {
        Err(CoreError::invalid_operation(
            operation,
            format!("session is {:?}, not active", session.status),
            context.clone(),
        ))
    }
}

fn details<const N: usize>(
    entries: [(&str, serde_json::Value); N],
) -> serde_json::Map<String, serde_json::Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn session_age_secs(session: &Session) -> f64 {
    chrono::DateTime::parse_from_rfc3339(&session.created_at)
        .map(|created| {
            (chrono::Utc::now() - created.with_timezone(&chrono::Utc))
                .num_milliseconds()
                .max(0) as f64
                / 1000.0
        })
        .unwrap_or(0.0)
}
