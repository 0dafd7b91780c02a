//! Engine core for Waypoint.
//!
//! This crate defines the `StateStore` port that the infrastructure layer
//! implements, plus everything that runs on top of it: the persistence
//! gateway, the action contract and registry, the input grammar, the graph
//! builder and the orchestrator. It depends only on `waypoint-types` --
//! never on `waypoint-infra` or any database/IO crate.

pub mod action;
pub mod application;
pub mod context;
pub mod definition;
pub mod gateway;
pub mod graph;
pub mod input;
pub mod storage;

pub use application::{Application, RunError};
pub use graph::{ActionGraph, GraphBuilder, GraphError};
pub use storage::StateStore;
