//! Session domain module.
//!
//! Contains the session aggregate and its nested models.
//!
//! # Module Structure
//!
//! - `model`: the `Session` aggregate, status, live feed settings, audit
//!   records
//! - `participant`: `Participant`, `ParticipantKind`, `ParticipantSpec`
//! - `event`: append-only `SessionEvent` log entries
//! - `breakout`: `BreakoutRoom` sub-sessions
//! - `summary`: dashboard projection

mod breakout;
mod event;
mod model;
mod participant;
mod summary;

// Re-export public API
pub use breakout::BreakoutRoom;
pub use event::{EventKind, SessionEvent};
pub use model::{AuditRecord, FeedVerbosity, LiveFeedSettings, Session, SessionStatus};
pub use participant::{Participant, ParticipantKind, ParticipantSpec};
pub use summary::SessionSummary;
