//! Heap snapshot and position pointer types.
//!
//! The heap is a read-only aggregate of every action's persisted output for a
//! single (application, user) identity. It is computed on demand and never
//! stored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every action's serialized output plus the current position pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    /// Action id -> serialized JSON output, `None` when never produced.
    pub heap: BTreeMap<String, Option<String>>,
    /// Raw pointer value; `None` when the identity never started a run.
    pub pointer: Option<String>,
}

impl HeapSnapshot {
    /// Serialized output of one action, if it produced any.
    pub fn raw_output(&self, action_id: &str) -> Option<&str> {
        self.heap.get(action_id).and_then(|v| v.as_deref())
    }

    /// Parsed output of one action. Unparseable output reads as `None`.
    pub fn output(&self, action_id: &str) -> Option<Map<String, Value>> {
        self.raw_output(action_id)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn pointer_state(&self) -> PointerState {
        PointerState::from_raw(self.pointer.as_deref())
    }
}

/// Interpretation of a stored position pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "action_id", rename_all = "snake_case")]
pub enum PointerState {
    /// No pointer stored: the next run starts at the root.
    NeverStarted,
    /// Empty pointer: the last run completed; the next run starts at the root.
    Completed,
    /// The next run resumes at this action.
    At(String),
}

impl PointerState {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => PointerState::NeverStarted,
            Some("") => PointerState::Completed,
            Some(id) => PointerState::At(id.to_string()),
        }
    }

    /// The action a run would resume at, if not the root.
    pub fn resume_at(&self) -> Option<&str> {
        match self {
            PointerState::At(id) => Some(id),
            _ => None,
        }
    }
}

impl std::fmt::Display for PointerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointerState::NeverStarted => f.write_str("never started"),
            PointerState::Completed => f.write_str("completed"),
            PointerState::At(id) => write!(f, "at '{id}'"),
        }
    }
}
