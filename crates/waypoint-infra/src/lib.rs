//! Infrastructure layer for Waypoint.
//!
//! Contains the implementations of the `StateStore` port defined in
//! `waypoint-core` (SQLite with WAL split pools), backend selection, and
//! the engine configuration loader.

pub mod config;
pub mod sqlite;
pub mod store;

pub use store::ConfiguredStore;
