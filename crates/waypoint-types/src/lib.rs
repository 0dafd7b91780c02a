//! Shared domain types for Waypoint.
//!
//! This crate contains the types shared by every layer of the engine: the
//! declarative application configuration tree, run identity/globals, stored
//! state records, heap snapshots, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod application;
pub mod config;
pub mod error;
pub mod heap;
pub mod state;
