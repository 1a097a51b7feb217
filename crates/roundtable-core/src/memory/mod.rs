//! Communal memory: external store contract and session-side mediation.
//!
//! The engine never persists communal memory itself; it mediates reads and
//! writes against an external store through the [`MemoryStore`] contract.
//! Implementations live in the infrastructure layer.

mod mediator;
mod store;

pub use mediator::{CommunalMemoryMediator, MemoryEvent};
pub use store::{CommunalDocument, MemoryStore};
