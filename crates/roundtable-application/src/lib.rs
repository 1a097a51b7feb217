//! Application layer for Roundtable.
//!
//! This crate provides the `Core` orchestration facade that coordinates
//! the domain components (sessions, turns, breakouts, communal memory,
//! metrics) behind one API, plus the session log export format.

pub mod core;
pub mod export;

pub use crate::core::Core;
pub use export::SessionExport;
