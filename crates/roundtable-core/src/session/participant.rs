//! Session participant types.

use crate::error::{CoreError, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// The kind of entity a participant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    /// An AI persona hosted by the application.
    Persona,
    /// An external agent reached over an integration.
    External,
    /// A human user.
    User,
}

/// Caller-supplied payload for adding a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSpec {
    /// Stable, caller-supplied identifier.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ParticipantKind,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl ParticipantSpec {
    pub fn new(id: impl Into<String>, kind: ParticipantKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Validates required fields are non-empty.
    pub fn validate(&self, context: ErrorContext) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::invalid_operation(
                "add_participant",
                "participant id must not be empty",
                context,
            ));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_operation(
                "add_participant",
                "participant name must not be empty",
                context,
            ));
        }
        Ok(())
    }
}

/// A participant in a session.
///
/// Participants are soft-removed: `is_active` flips to false and `left_at`
/// is set, but the record is never physically deleted, to preserve audit
/// continuity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable, caller-supplied identifier.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ParticipantKind,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Timestamp the participant joined (ISO 8601 format).
    pub joined_at: String,
    /// Timestamp the participant left, if they have (ISO 8601 format).
    #[serde(default)]
    pub left_at: Option<String>,
    /// Ordinal position assigned at join time.
    pub position: usize,
    pub is_active: bool,
}

impl Participant {
    /// Creates an active participant from a spec at the given ordinal
    /// position.
    pub fn from_spec(spec: ParticipantSpec, position: usize) -> Self {
        Self {
            id: spec.id,
            kind: spec.kind,
            name: spec.name,
            role: spec.role,
            joined_at: chrono::Utc::now().to_rfc3339(),
            left_at: None,
            position,
            is_active: true,
        }
    }

    /// Soft-removes the participant.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.left_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorContext;

    #[test]
    fn spec_rejects_empty_fields() {
        let spec = ParticipantSpec::new("", ParticipantKind::Persona, "Alden");
        assert!(spec.validate(ErrorContext::new("add_participant")).is_err());

        let spec = ParticipantSpec::new("alden", ParticipantKind::Persona, "  ");
        assert!(spec.validate(ErrorContext::new("add_participant")).is_err());

        let spec = ParticipantSpec::new("alden", ParticipantKind::Persona, "Alden");
        assert!(spec.validate(ErrorContext::new("add_participant")).is_ok());
    }

    #[test]
    fn deactivate_is_a_soft_remove() {
        let spec = ParticipantSpec::new("alden", ParticipantKind::Persona, "Alden");
        let mut participant = Participant::from_spec(spec, 0);
        assert!(participant.is_active);
        assert!(participant.left_at.is_none());

        participant.deactivate();
        assert!(!participant.is_active);
        assert!(participant.left_at.is_some());
        // The record itself survives.
        assert_eq!(participant.id, "alden");
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ParticipantKind::External).unwrap();
        assert_eq!(json, "\"external\"");
    }
}
