//! Storage abstractions for Waypoint.
//!
//! Defines the `StateStore` port and a process-local implementation.
//! The SQLite implementation lives in waypoint-infra.

pub mod memory;
pub mod state_store;

pub use memory::MemoryStateStore;
pub use state_store::StateStore;
