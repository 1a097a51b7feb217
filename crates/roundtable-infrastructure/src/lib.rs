//! Infrastructure layer for Roundtable.
//!
//! Concrete adapters for the contracts defined in `roundtable-core`.

pub mod memory_store;

pub use memory_store::InMemoryMemoryStore;
