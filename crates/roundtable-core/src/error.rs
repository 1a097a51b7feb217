//! Error types for the Roundtable orchestration engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of error categories for orchestration failures.
///
/// Every [`CoreError`] maps to exactly one category. Recovery strategies
/// and failure metrics are keyed by category, never inferred from message
/// text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    SessionManagement,
    ParticipantManagement,
    TurnTaking,
    BreakoutRoom,
    CommunalMemory,
    VaultIntegration,
    InvalidOperation,
}

impl ErrorCategory {
    /// All categories, in a fixed order (used to pre-register strategies).
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::SessionManagement,
        ErrorCategory::ParticipantManagement,
        ErrorCategory::TurnTaking,
        ErrorCategory::BreakoutRoom,
        ErrorCategory::CommunalMemory,
        ErrorCategory::VaultIntegration,
        ErrorCategory::InvalidOperation,
    ];

    /// Stable snake_case name, used as a metric tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::SessionManagement => "session_management",
            ErrorCategory::ParticipantManagement => "participant_management",
            ErrorCategory::TurnTaking => "turn_taking",
            ErrorCategory::BreakoutRoom => "breakout_room",
            ErrorCategory::CommunalMemory => "communal_memory",
            ErrorCategory::VaultIntegration => "vault_integration",
            ErrorCategory::InvalidOperation => "invalid_operation",
        }
    }
}

/// Context attached to every orchestration error.
///
/// Carries enough information for the host to render a user-facing message
/// and for audits to reconstruct what was attempted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub session_id: Option<String>,
    pub participant_id: Option<String>,
    pub user_id: Option<String>,
    pub operation: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A shared error type for the Roundtable orchestration engine.
///
/// Typed, structured variants attached at the call site. Categories are
/// never derived from message text.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoreError {
    /// Session lookup failed.
    #[error("session '{session_id}' not found")]
    SessionNotFound {
        session_id: String,
        context: ErrorContext,
    },

    /// Active participant lookup failed within a session.
    #[error("participant '{participant_id}' not found in session '{session_id}'")]
    ParticipantNotFound {
        participant_id: String,
        session_id: String,
        context: ErrorContext,
    },

    /// Argument validation or state-machine violation.
    #[error("operation '{operation}' not valid: {reason}")]
    InvalidOperation {
        operation: String,
        reason: String,
        context: ErrorContext,
    },

    /// Turn scheduling failure (e.g. advance before start).
    #[error("turn-taking error: {message}")]
    TurnTaking {
        message: String,
        context: ErrorContext,
    },

    /// Breakout room failure (unknown or already ended room).
    #[error("breakout room error: {message}")]
    BreakoutRoom {
        message: String,
        context: ErrorContext,
    },

    /// Communal memory mediation failure on the session side
    /// (e.g. mutation on a session with no memory handle).
    #[error("communal memory error: {message}")]
    CommunalMemory {
        message: String,
        context: ErrorContext,
    },

    /// External store failure (unreachable store, stale handle).
    #[error("vault integration error: {message}")]
    VaultIntegration {
        message: String,
        context: ErrorContext,
    },
}

impl CoreError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    pub fn session_not_found(session_id: impl Into<String>, context: ErrorContext) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
            context,
        }
    }

    pub fn participant_not_found(
        participant_id: impl Into<String>,
        session_id: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::ParticipantNotFound {
            participant_id: participant_id.into(),
            session_id: session_id.into(),
            context,
        }
    }

    pub fn invalid_operation(
        operation: impl Into<String>,
        reason: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::InvalidOperation {
            operation: operation.into(),
            reason: reason.into(),
            context,
        }
    }

    pub fn turn_taking(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::TurnTaking {
            message: message.into(),
            context,
        }
    }

    pub fn breakout_room(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::BreakoutRoom {
            message: message.into(),
            context,
        }
    }

    pub fn communal_memory(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::CommunalMemory {
            message: message.into(),
            context,
        }
    }

    pub fn vault_integration(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::VaultIntegration {
            message: message.into(),
            context,
        }
    }

    // ============================================================================
    // Classification
    // ============================================================================

    /// The category this error belongs to. Matched exhaustively so new
    /// variants fail to compile until classified.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SessionNotFound { .. } => ErrorCategory::SessionManagement,
            Self::ParticipantNotFound { .. } => ErrorCategory::ParticipantManagement,
            Self::InvalidOperation { .. } => ErrorCategory::InvalidOperation,
            Self::TurnTaking { .. } => ErrorCategory::TurnTaking,
            Self::BreakoutRoom { .. } => ErrorCategory::BreakoutRoom,
            Self::CommunalMemory { .. } => ErrorCategory::CommunalMemory,
            Self::VaultIntegration { .. } => ErrorCategory::VaultIntegration,
        }
    }

    /// The context attached at the call site.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::SessionNotFound { context, .. }
            | Self::ParticipantNotFound { context, .. }
            | Self::InvalidOperation { context, .. }
            | Self::TurnTaking { context, .. }
            | Self::BreakoutRoom { context, .. }
            | Self::CommunalMemory { context, .. }
            | Self::VaultIntegration { context, .. } => context,
        }
    }

    /// Check if this is a SessionNotFound error.
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }

    /// Check if this is a ParticipantNotFound error.
    pub fn is_participant_not_found(&self) -> bool {
        matches!(self, Self::ParticipantNotFound { .. })
    }

    /// Check if this is an InvalidOperation error.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation { .. })
    }
}

/// A type alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_is_attached_at_call_site() {
        let err = CoreError::session_not_found("room-1", ErrorContext::new("get_session"));
        assert_eq!(err.category(), ErrorCategory::SessionManagement);
        assert!(err.is_session_not_found());

        let err = CoreError::turn_taking(
            "turn-taking not started",
            ErrorContext::new("advance_turn").with_session("room-1"),
        );
        assert_eq!(err.category(), ErrorCategory::TurnTaking);
        assert_eq!(err.context().session_id.as_deref(), Some("room-1"));
    }

    #[test]
    fn context_builder_accumulates_fields() {
        let ctx = ErrorContext::new("add_participant")
            .with_session("room-1")
            .with_participant("alden")
            .with_user("owner")
            .with_metadata("role", serde_json::json!("facilitator"));

        assert_eq!(ctx.operation.as_deref(), Some("add_participant"));
        assert_eq!(ctx.participant_id.as_deref(), Some("alden"));
        assert_eq!(ctx.metadata["role"], serde_json::json!("facilitator"));
    }

    #[test]
    fn errors_serialize_round_trip() {
        let err = CoreError::breakout_room(
            "breakout 'b-1' is not open",
            ErrorContext::new("end_breakout").with_session("room-1"),
        );
        let json = serde_json::to_string(&err).unwrap();
        let back: CoreError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
